//! # EasyCars API Errors
//!
//! Every EasyCars payload carries a logical `ResponseCode` next to the
//! HTTP status. Both are folded into one [`ApiError`] that callers match on.
//!
//! ## Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Response Code Handling                               │
//! │                                                                         │
//! │  Code │ Variant          │ Retry │ Side effect                         │
//! │  ─────┼──────────────────┼───────┼──────────────────────────────────── │
//! │   0   │ (success)        │   -   │ payload returned                    │
//! │   1   │ Authentication   │  no   │ cached token invalidated            │
//! │   5   │ Temporary        │  yes  │                                     │
//! │   7   │ Validation       │  no   │ caller input problem                │
//! │   9   │ Fatal            │  no   │ provider refuses                    │
//! │   ?   │ Unknown { code } │  no   │ raw code kept for diagnosis         │
//! │                                                                         │
//! │  HTTP 401        → Authentication                                      │
//! │  HTTP 5xx / 429  → HttpStatus (retryable)                              │
//! │  other HTTP 4xx  → HttpStatus (not retryable)                          │
//! │  timeout / reset → Transport (retryable)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Logical result code embedded in every EasyCars response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    AuthenticationFailed,
    Temporary,
    Validation,
    Fatal,
    Unknown(i64),
}

impl From<i64> for ResponseCode {
    fn from(code: i64) -> Self {
        match code {
            0 => ResponseCode::Success,
            1 => ResponseCode::AuthenticationFailed,
            5 => ResponseCode::Temporary,
            7 => ResponseCode::Validation,
            9 => ResponseCode::Fatal,
            other => ResponseCode::Unknown(other),
        }
    }
}

impl ResponseCode {
    /// The numeric code as sent by EasyCars.
    pub fn code(self) -> i64 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::AuthenticationFailed => 1,
            ResponseCode::Temporary => 5,
            ResponseCode::Validation => 7,
            ResponseCode::Fatal => 9,
            ResponseCode::Unknown(code) => code,
        }
    }

    /// Turns a response code into `Ok(())` or the matching error.
    pub fn into_result(self, message: Option<String>) -> Result<(), ApiError> {
        let message = message.unwrap_or_default();
        match self {
            ResponseCode::Success => Ok(()),
            ResponseCode::AuthenticationFailed => Err(ApiError::Authentication { message }),
            ResponseCode::Temporary => Err(ApiError::Temporary { message }),
            ResponseCode::Validation => Err(ApiError::Validation { message }),
            ResponseCode::Fatal => Err(ApiError::Fatal { message }),
            ResponseCode::Unknown(code) => Err(ApiError::Unknown { code, message }),
        }
    }
}

/// A failed EasyCars call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // =========================================================================
    // Provider response codes
    // =========================================================================
    /// Code 1 or HTTP 401.
    #[error("EasyCars authentication failed: {message}")]
    Authentication { message: String },

    /// Code 5. The provider processed nothing and asks for a retry.
    #[error("EasyCars temporary error: {message}")]
    Temporary { message: String },

    /// Code 7. The request data was rejected.
    #[error("EasyCars rejected the request: {message}")]
    Validation { message: String },

    /// Code 9. The provider refuses the operation permanently.
    #[error("EasyCars fatal error: {message}")]
    Fatal { message: String },

    /// Any code not listed above.
    #[error("EasyCars returned unknown response code {code}: {message}")]
    Unknown { code: i64, message: String },

    // =========================================================================
    // Transport
    // =========================================================================
    /// The request did not complete.
    ///
    /// `connect` is true when the connection was never established, so the
    /// provider cannot have seen the request.
    #[error("EasyCars transport error: {message}")]
    Transport {
        message: String,
        connect: bool,
        timeout: bool,
    },

    /// Non-success HTTP status other than 401.
    #[error("EasyCars returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("Invalid EasyCars response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for failures that may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Temporary { .. } | ApiError::Transport { .. } => true,
            ApiError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            ApiError::Authentication { .. }
            | ApiError::Validation { .. }
            | ApiError::Fatal { .. }
            | ApiError::Unknown { .. }
            | ApiError::Decode(_) => false,
        }
    }

    /// True when it is certain the provider did not act on the request.
    pub fn request_not_processed(&self) -> bool {
        matches!(
            self,
            ApiError::Temporary { .. } | ApiError::Transport { connect: true, .. }
        )
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Authentication { .. })
    }

    /// The provider response code, if the failure came from one.
    pub fn response_code(&self) -> Option<i64> {
        match self {
            ApiError::Authentication { .. } => Some(1),
            ApiError::Temporary { .. } => Some(5),
            ApiError::Validation { .. } => Some(7),
            ApiError::Fatal { .. } => Some(9),
            ApiError::Unknown { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Decode(err.to_string());
        }
        ApiError::Transport {
            message: err.to_string(),
            connect: err.is_connect(),
            timeout: err.is_timeout(),
        }
    }
}
