//! # Error Types
//!
//! Domain-specific error types for dealerhub-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dealerhub-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule failures (bad stock item, ...)     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dealerhub-db errors                                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  dealerhub-sync errors                                                 │
//! │  ├── VaultError       - Credential encryption failures                 │
//! │  ├── ApiError         - EasyCars response-code taxonomy                │
//! │  └── SyncError        - Everything a sync run can fail with            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type for domain operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A remote stock record could not be interpreted.
    ///
    /// ## When This Occurs
    /// - The record is not a JSON object
    /// - A field has the wrong JSON type (e.g. `Year: "abc"`)
    #[error("Malformed stock item: {0}")]
    MalformedStockItem(String),

    /// A lead status string or code is not recognised.
    #[error("Unknown lead status: {0}")]
    UnknownLeadStatus(String),

    /// Environment string is neither `Test` nor `Production`.
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised both for admin input (credentials) and for remote stock records
/// that cannot become a local vehicle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field must be GUID-shaped.
    #[error("{field} must be a GUID")]
    NotAGuid { field: String },

    /// Numeric field outside its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        value: i64,
    },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Field exceeds maximum length.
    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: String, max: usize },

    /// Value is not one of the accepted options.
    #[error("{field} must be one of: {allowed}")]
    NotAllowed { field: String, allowed: String },
}

impl ValidationError {
    /// Shorthand for a `Required` error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::OutOfRange {
            field: "year".into(),
            min: 1900,
            max: 2027,
            value: 1800,
        };
        assert_eq!(err.to_string(), "year must be between 1900 and 2027, got 1800");
    }

    #[test]
    fn test_core_error_wraps_validation() {
        let err: CoreError = ValidationError::required("make").into();
        assert!(err.to_string().contains("make is required"));
    }
}
