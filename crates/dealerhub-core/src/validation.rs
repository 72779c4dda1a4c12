//! # Validation Module
//!
//! Validation of admin-supplied EasyCars credentials before they are
//! encrypted and stored.
//!
//! ## Rules
//! ```text
//! ┌────────────────────┬──────────────────────────────────────────────┐
//! │ client_id          │ required, ≤ 200 chars                        │
//! │ client_secret      │ required, ≤ 200 chars                        │
//! │ account_number     │ required, GUID-shaped                        │
//! │ account_secret     │ required, GUID-shaped                        │
//! │ environment        │ "Test" | "Production"                        │
//! │ yard_code          │ optional, ≤ 50 chars                         │
//! └────────────────────┴──────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::Environment;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_CLIENT_FIELD_LEN: usize = 200;
const MAX_YARD_CODE_LEN: usize = 50;

/// Plaintext credential input as received from an admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialInput {
    pub client_id: String,
    pub client_secret: String,
    pub account_number: String,
    pub account_secret: String,
    pub environment: String,
    pub yard_code: Option<String>,
}

/// Credential input that passed validation.
#[derive(Debug, Clone)]
pub struct ValidCredentialInput {
    pub client_id: String,
    pub client_secret: String,
    pub account_number: String,
    pub account_secret: String,
    pub environment: Environment,
    pub yard_code: Option<String>,
}

/// Validates a credential input, trimming whitespace.
///
/// ## Example
/// ```rust
/// use dealerhub_core::validation::{validate_credential_input, CredentialInput};
///
/// let input = CredentialInput {
///     client_id: "dealer-portal".into(),
///     client_secret: "s3cret".into(),
///     account_number: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
///     account_secret: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
///     environment: "Test".into(),
///     yard_code: None,
/// };
/// assert!(validate_credential_input(&input).is_ok());
/// ```
pub fn validate_credential_input(input: &CredentialInput) -> ValidationResult<ValidCredentialInput> {
    let client_id = required_bounded("client_id", &input.client_id, MAX_CLIENT_FIELD_LEN)?;
    let client_secret =
        required_bounded("client_secret", &input.client_secret, MAX_CLIENT_FIELD_LEN)?;
    let account_number = validate_guid("account_number", &input.account_number)?;
    let account_secret = validate_guid("account_secret", &input.account_secret)?;
    let environment = validate_environment(&input.environment)?;

    let yard_code = match input.yard_code.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(code) if code.len() > MAX_YARD_CODE_LEN => {
            return Err(ValidationError::TooLong {
                field: "yard_code".to_string(),
                max: MAX_YARD_CODE_LEN,
            })
        }
        Some(code) => Some(code.to_string()),
    };

    Ok(ValidCredentialInput {
        client_id,
        client_secret,
        account_number,
        account_secret,
        environment,
        yard_code,
    })
}

/// Validates that a value is GUID-shaped.
pub fn validate_guid(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    Uuid::parse_str(value).map_err(|_| ValidationError::NotAGuid {
        field: field.to_string(),
    })?;
    Ok(value.to_string())
}

/// Validates the environment name.
pub fn validate_environment(value: &str) -> ValidationResult<Environment> {
    value.parse().map_err(|_| ValidationError::NotAllowed {
        field: "environment".to_string(),
        allowed: "Test, Production".to_string(),
    })
}

fn required_bounded(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value.to_string())
}
