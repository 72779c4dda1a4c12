//! # Domain Types
//!
//! Persisted and exchanged types for the EasyCars integration.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Credential    │   │    Vehicle      │   │      Lead       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  dealership_id  │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  encrypted_*    │   │  make / model   │   │  status         │       │
//! │  │  environment    │   │  price_cents    │   │  remote number  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StockDataRow   │   │    SyncLog      │   │ LeadStatus-     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │   Conflict      │       │
//! │  │  vehicle_id     │   │  status         │   │  ─────────────  │       │
//! │  │  raw_json       │   │  counts         │   │  local/remote   │       │
//! │  │  api_version    │   │  errors         │   │  resolved       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every row is partitioned by `dealership_id` (the tenant).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

/// Dealership (tenant) identifier.
pub type DealershipId = i64;

// =============================================================================
// Environment
// =============================================================================

/// EasyCars environment a credential authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
#[ts(export)]
pub enum Environment {
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "Test"),
            Environment::Production => write!(f, "Production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Test" => Ok(Environment::Test),
            "Production" => Ok(Environment::Production),
            other => Err(CoreError::UnknownEnvironment(other.to_string())),
        }
    }
}

// =============================================================================
// Credential
// =============================================================================

/// Stored EasyCars credential for one dealership.
///
/// All four secrets are ciphertext produced by the credential vault.
/// Plaintext never reaches this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Credential {
    pub id: String,
    pub dealership_id: DealershipId,
    pub encrypted_client_id: String,
    pub encrypted_client_secret: String,
    pub encrypted_account_number: String,
    pub encrypted_account_secret: String,
    pub environment: Environment,
    pub yard_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Redacted credential view for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CredentialSummary {
    pub id: String,
    pub dealership_id: DealershipId,
    pub environment: Environment,
    pub yard_code: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Credential> for CredentialSummary {
    fn from(c: &Credential) -> Self {
        CredentialSummary {
            id: c.id.clone(),
            dealership_id: c.dealership_id,
            environment: c.environment,
            yard_code: c.yard_code.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

// =============================================================================
// Vehicle
// =============================================================================

/// Physical condition of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum VehicleCondition {
    New,
    #[default]
    Used,
    Demo,
}

impl VehicleCondition {
    /// Parses the EasyCars condition string. Unknown values map to `Used`.
    pub fn from_remote(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => VehicleCondition::New,
            "demo" | "demonstrator" => VehicleCondition::Demo,
            _ => VehicleCondition::Used,
        }
    }

    /// Name sent to EasyCars.
    pub fn remote_name(&self) -> &'static str {
        match self {
            VehicleCondition::New => "New",
            VehicleCondition::Used => "Used",
            VehicleCondition::Demo => "Demo",
        }
    }
}

/// Listing status of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    #[default]
    Available,
    Sold,
    OnHold,
}

impl VehicleStatus {
    /// Parses the EasyCars status string. Unknown values map to `Available`.
    pub fn from_remote(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace([' ', '_'], "").as_str() {
            "sold" => VehicleStatus::Sold,
            "onhold" | "hold" | "deposit" => VehicleStatus::OnHold,
            _ => VehicleStatus::Available,
        }
    }

    /// Name sent to EasyCars.
    pub fn remote_name(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "Available",
            VehicleStatus::Sold => "Sold",
            VehicleStatus::OnHold => "OnHold",
        }
    }
}

/// A vehicle in a dealership's local inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub dealership_id: DealershipId,
    pub stock_number: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
    /// Price in cents (smallest currency unit).
    pub price_cents: i64,
    pub mileage: i64,
    pub condition: VehicleCondition,
    pub status: VehicleStatus,
    pub vin: Option<String>,
    pub description: Option<String>,
    /// Image URLs in display order.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Lead
// =============================================================================

/// Local lead lifecycle.
///
/// ```text
/// Received ──► InProgress ──► Won
///                        └──► Lost
/// ```
///
/// `Done` is a legacy value kept for existing rows. It is communicated
/// outward as `Won` and compared as `Won` during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LeadStatus {
    Received,
    InProgress,
    Won,
    Lost,
    /// Legacy alias of `Won`.
    Done,
}

impl LeadStatus {
    /// Status as it should be communicated to other systems.
    pub fn normalized(self) -> LeadStatus {
        match self {
            LeadStatus::Done => LeadStatus::Won,
            other => other,
        }
    }

    /// Returns true for `Won`, `Lost` and the legacy `Done`.
    pub fn is_terminal(self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost | LeadStatus::Done)
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::Received => write!(f, "received"),
            LeadStatus::InProgress => write!(f, "in_progress"),
            LeadStatus::Won => write!(f, "won"),
            LeadStatus::Lost => write!(f, "lost"),
            LeadStatus::Done => write!(f, "done"),
        }
    }
}

/// A customer enquiry captured by the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Lead {
    pub id: String,
    pub dealership_id: DealershipId,
    pub vehicle_id: Option<String>,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub status: LeadStatus,
    /// EasyCars lead number, set once the lead exists remotely.
    pub easycars_lead_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Data Mapping
// =============================================================================

/// Link between a local vehicle and its EasyCars stock record.
///
/// One row per vehicle, holding the latest raw payload verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockDataRow {
    pub id: String,
    pub dealership_id: DealershipId,
    pub vehicle_id: String,
    pub stock_number: String,
    pub raw_json: String,
    pub api_version: String,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Sync Log
// =============================================================================

/// Which synchronization a log row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncType {
    Stock,
    Lead,
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncType::Stock => write!(f, "stock"),
            SyncType::Lead => write!(f, "lead"),
        }
    }
}

/// Outcome classification of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::PartialSuccess => write!(f, "partial_success"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One sync attempt for one dealership. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncLog {
    pub id: String,
    pub dealership_id: DealershipId,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub items_processed: i64,
    pub items_succeeded: i64,
    pub items_failed: i64,
    /// Error messages in the order they occurred.
    pub errors: Vec<String>,
    pub duration_ms: i64,
    #[ts(as = "String")]
    pub synced_at: DateTime<Utc>,
}

/// One page of sync history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncHistoryPage {
    pub items: Vec<SyncLog>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Dashboard summary for one dealership.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncStatusSummary {
    pub dealership_id: DealershipId,
    pub has_credentials: bool,
    pub auto_sync_enabled: bool,
    pub last_stock_sync: Option<SyncLog>,
    pub last_lead_sync: Option<SyncLog>,
    pub unresolved_conflicts: i64,
}

// =============================================================================
// Lead Status Conflicts
// =============================================================================

/// How divergent local/remote lead statuses are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConflictResolutionStrategy {
    /// Push local status outward, ignore remote.
    LocalWins,
    /// Pull remote status inward, overwrite local.
    RemoteWins,
    /// Record a conflict and take no automatic action.
    #[default]
    ManualReview,
}

/// Choice made by an operator when closing a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConflictResolution {
    KeepLocal,
    AcceptRemote,
}

/// A detected divergence between local and remote lead status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LeadStatusConflict {
    pub id: String,
    pub lead_id: String,
    pub dealership_id: DealershipId,
    pub local_status: LeadStatus,
    /// Remote status translated into the local vocabulary.
    pub remote_status: LeadStatus,
    pub strategy: ConflictResolutionStrategy,
    pub resolved: bool,
    pub resolution: Option<ConflictResolution>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Policies
// =============================================================================

/// What to do with remote stock that has no local vehicle yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOnlyPolicy {
    /// Create a local vehicle for it.
    #[default]
    Import,
    /// Leave it alone; it is counted but not written.
    Ignore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("Test".parse::<Environment>().unwrap(), Environment::Test);
        assert_eq!(
            "Production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert!("production".parse::<Environment>().is_err());
        assert!("Staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_done_normalizes_to_won() {
        assert_eq!(LeadStatus::Done.normalized(), LeadStatus::Won);
        assert_eq!(LeadStatus::Lost.normalized(), LeadStatus::Lost);
        assert!(LeadStatus::Done.is_terminal());
        assert!(!LeadStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_remote_condition_and_status() {
        assert_eq!(VehicleCondition::from_remote("NEW"), VehicleCondition::New);
        assert_eq!(VehicleCondition::from_remote("Demonstrator"), VehicleCondition::Demo);
        assert_eq!(VehicleCondition::from_remote("anything"), VehicleCondition::Used);
        assert_eq!(VehicleStatus::from_remote("On Hold"), VehicleStatus::OnHold);
        assert_eq!(VehicleStatus::from_remote("Sold"), VehicleStatus::Sold);
        assert_eq!(VehicleStatus::from_remote(""), VehicleStatus::Available);
    }
}
