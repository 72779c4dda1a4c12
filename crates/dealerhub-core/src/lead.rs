//! # Lead Status Mapping
//!
//! Translation between the local lead lifecycle and EasyCars lead status
//! codes, and the pure decision of what reconciliation should do.
//!
//! ## Mapping
//! ```text
//! ┌──────────────────────┬───────────────────────┐
//! │ Local                │ EasyCars code         │
//! ├──────────────────────┼───────────────────────┤
//! │ Received             │ 1 New                 │
//! │ InProgress           │ 2 InProgress          │
//! │ Won                  │ 3 Won                 │
//! │ Done (legacy)        │ 3 Won                 │
//! │ Lost                 │ 4 Lost                │
//! └──────────────────────┴───────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{ConflictResolutionStrategy, LeadStatus};

// =============================================================================
// Remote Lead Status
// =============================================================================

/// Lead status as EasyCars encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteLeadStatus {
    New,
    InProgress,
    Won,
    Lost,
}

impl RemoteLeadStatus {
    /// Decodes an EasyCars status code.
    pub fn from_code(code: i32) -> CoreResult<Self> {
        match code {
            1 => Ok(RemoteLeadStatus::New),
            2 => Ok(RemoteLeadStatus::InProgress),
            3 => Ok(RemoteLeadStatus::Won),
            4 => Ok(RemoteLeadStatus::Lost),
            other => Err(CoreError::UnknownLeadStatus(other.to_string())),
        }
    }

    /// The EasyCars status code.
    pub fn code(self) -> i32 {
        match self {
            RemoteLeadStatus::New => 1,
            RemoteLeadStatus::InProgress => 2,
            RemoteLeadStatus::Won => 3,
            RemoteLeadStatus::Lost => 4,
        }
    }

    /// The local status equivalent to this remote status.
    pub fn to_local(self) -> LeadStatus {
        match self {
            RemoteLeadStatus::New => LeadStatus::Received,
            RemoteLeadStatus::InProgress => LeadStatus::InProgress,
            RemoteLeadStatus::Won => LeadStatus::Won,
            RemoteLeadStatus::Lost => LeadStatus::Lost,
        }
    }
}

impl From<LeadStatus> for RemoteLeadStatus {
    /// Outward mapping. The legacy `Done` is sent as `Won`.
    fn from(status: LeadStatus) -> Self {
        match status.normalized() {
            LeadStatus::Received => RemoteLeadStatus::New,
            LeadStatus::InProgress => RemoteLeadStatus::InProgress,
            LeadStatus::Won | LeadStatus::Done => RemoteLeadStatus::Won,
            LeadStatus::Lost => RemoteLeadStatus::Lost,
        }
    }
}

// =============================================================================
// Reconciliation Decision
// =============================================================================

/// What the reconciler should do for one lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Both sides agree.
    InSync,
    /// Send the local status to EasyCars.
    PushLocal(RemoteLeadStatus),
    /// Overwrite the local status.
    PullRemote(LeadStatus),
    /// Record a conflict for an operator.
    FlagConflict {
        local: LeadStatus,
        remote: LeadStatus,
    },
}

/// Decides how to reconcile a lead whose local and remote statuses are known.
///
/// `Done` locally and `Won` remotely agree.
pub fn decide_reconciliation(
    local: LeadStatus,
    remote: RemoteLeadStatus,
    strategy: ConflictResolutionStrategy,
) -> ReconcileAction {
    if RemoteLeadStatus::from(local) == remote {
        return ReconcileAction::InSync;
    }

    match strategy {
        ConflictResolutionStrategy::LocalWins => ReconcileAction::PushLocal(local.into()),
        ConflictResolutionStrategy::RemoteWins => ReconcileAction::PullRemote(remote.to_local()),
        ConflictResolutionStrategy::ManualReview => ReconcileAction::FlagConflict {
            local,
            remote: remote.to_local(),
        },
    }
}
