//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Credentials   │  │     Remote (ApiError)   │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Vault          │  │  Authentication (1)     │ │
//! │  │  ConfigLoad     │  │  Missing        │  │  Temporary (5)          │ │
//! │  │  MissingKey     │  │  EnvironmentLock│  │  Validation (7)         │ │
//! │  │  InvalidKey     │  │                 │  │  Fatal (9) / Unknown    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Database     │  │   Local input   │  │      Control            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  DbError        │  │  Validation     │  │  SyncDisabled           │ │
//! │  │                 │  │  Core / NotFound│  │  Internal               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::client::ApiError;
use crate::vault::VaultError;
use dealerhub_core::{CoreError, DealershipId, ValidationError};
use dealerhub_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Credential Errors
    // =========================================================================
    #[error("Credential vault error: {0}")]
    Vault(#[from] VaultError),

    /// The dealership has no stored EasyCars credential.
    #[error("Dealership {0} has no EasyCars credentials")]
    MissingCredentials(DealershipId),

    /// The environment can't change once a sync has succeeded.
    #[error("Dealership {dealership_id} has synced successfully; its environment can no longer change")]
    EnvironmentLocked { dealership_id: DealershipId },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    #[error(transparent)]
    Api(#[from] ApiError),

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Control
    // =========================================================================
    /// The global kill switch is off.
    #[error("EasyCars sync is disabled system-wide")]
    SyncDisabled,

    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Internal(format!("JSON encoding failed: {err}"))
    }
}

impl SyncError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        SyncError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    // =========================================================================
    // Error Categorization
    // =========================================================================

    /// Returns true if repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Api(err) => err.is_retryable(),
            SyncError::Database(DbError::PoolExhausted) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::Vault(VaultError::MissingKey | VaultError::InvalidKey(_))
        )
    }

    /// Returns true for remote or local authentication failures.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SyncError::Api(ApiError::Authentication { .. })
                | SyncError::Vault(VaultError::AuthenticationFailed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Api(ApiError::Temporary {
            message: "busy".into()
        })
        .is_retryable());
        assert!(!SyncError::Api(ApiError::Fatal {
            message: "no".into()
        })
        .is_retryable());
        assert!(!SyncError::MissingCredentials(1).is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert!(SyncError::Vault(VaultError::MissingKey).is_config_error());
        assert!(SyncError::InvalidConfig("x".into()).is_config_error());
        assert!(!SyncError::Vault(VaultError::AuthenticationFailed).is_config_error());

        assert!(SyncError::Vault(VaultError::AuthenticationFailed).is_auth_error());
        assert!(SyncError::Api(ApiError::Authentication {
            message: "bad".into()
        })
        .is_auth_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::EnvironmentLocked { dealership_id: 12 };
        assert!(err.to_string().contains("12"));
        let err = SyncError::from(ApiError::Unknown {
            code: 33,
            message: "odd".into(),
        });
        assert!(err.to_string().contains("33"));
    }
}
