//! # Sync Result
//!
//! Counters collected during one sync run and the rule that turns them into
//! a [`SyncStatus`].
//!
//! ```text
//! failed == 0                       → Success   (empty batch included)
//! failed > 0 && succeeded > 0       → PartialSuccess
//! failed > 0 && succeeded == 0      → Failed
//! aborted before any item           → Failed    (single abort reason)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::SyncStatus;

/// Outcome of one sync run for one dealership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    /// Items counted as succeeded without any write (unchanged or ignored).
    pub skipped: i64,
    pub errors: Vec<String>,
    pub elapsed: Duration,
    aborted: bool,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A run that failed before any item was attempted.
    pub fn aborted(reason: impl Into<String>, elapsed: Duration) -> Self {
        SyncResult {
            errors: vec![reason.into()],
            elapsed,
            aborted: true,
            ..Default::default()
        }
    }

    /// Records an item that was written successfully.
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// Records an item that needed no write.
    pub fn record_skipped(&mut self) {
        self.record_success();
        self.skipped += 1;
    }

    /// Records a failed item with its error message.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.processed += 1;
        self.failed += 1;
        self.errors.push(error.into());
    }

    /// Folds another run's counters into this one.
    pub fn merge(&mut self, other: SyncResult) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
        self.aborted |= other.aborted;
    }

    pub fn finish(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Classifies the run. An aborted run is never a full success.
    pub fn status(&self) -> SyncStatus {
        if self.aborted {
            return match self.succeeded {
                0 => SyncStatus::Failed,
                _ => SyncStatus::PartialSuccess,
            };
        }
        match (self.succeeded, self.failed) {
            (_, 0) => SyncStatus::Success,
            (0, _) => SyncStatus::Failed,
            _ => SyncStatus::PartialSuccess,
        }
    }
}
