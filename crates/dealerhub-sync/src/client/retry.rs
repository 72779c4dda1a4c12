//! # Retry Policy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Retry Decision per Failed Attempt                      │
//! │                                                                         │
//! │                    ┌───────────────────────┐                           │
//! │  ApiError ────────►│ Idempotency::allows() │── no ──► return error     │
//! │                    └──────────┬────────────┘                           │
//! │                               │ yes                                     │
//! │                    ┌──────────▼────────────┐                           │
//! │                    │ backoff.next_backoff()│── None ─► return error    │
//! │                    └──────────┬────────────┘  (attempts exhausted)     │
//! │                               │ Some(delay)                             │
//! │                         sleep(delay), retry                             │
//! │                                                                         │
//! │  LINEAR DELAY                                                          │
//! │  Retry 1: 1 × delay                                                    │
//! │  Retry 2: 2 × delay                                                    │
//! │  ...up to retry_attempts - 1 retries                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ApiError;

// =============================================================================
// Linear Backoff
// =============================================================================

/// Linear backoff with a cap on total attempts.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    delay: Duration,
    max_attempts: u32,
    retries: u32,
}

impl LinearBackoff {
    /// `max_attempts` counts the first attempt; 1 disables retries.
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        LinearBackoff {
            delay,
            max_attempts: max_attempts.max(1),
            retries: 0,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl Backoff for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries + 1 >= self.max_attempts {
            return None;
        }
        self.retries += 1;
        Some(self.delay * self.retries)
    }

    fn reset(&mut self) {
        self.retries = 0;
    }
}

// =============================================================================
// Idempotency
// =============================================================================

/// Whether an operation may be repeated safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Reads and overwrites. Any retryable failure is retried.
    Idempotent,

    /// Creates. Retried only when the provider cannot have acted on the
    /// request (response code 5, or no connection was made).
    NonIdempotent,
}

impl Idempotency {
    pub fn allows_retry(self, err: &ApiError) -> bool {
        match self {
            Idempotency::Idempotent => err.is_retryable(),
            Idempotency::NonIdempotent => err.request_not_processed(),
        }
    }
}

// =============================================================================
// Retry Loop
// =============================================================================

/// Runs `attempt` until it succeeds, fails permanently, or the backoff
/// runs out. The closure receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(
    operation: &str,
    mut backoff: LinearBackoff,
    idempotency: Idempotency,
    mut attempt: F,
) -> Result<T, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut number = 1u32;
    loop {
        match attempt(number).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !idempotency.allows_retry(&err) {
                    debug!(operation, attempt = number, ?err, "Not retrying EasyCars call");
                    return Err(err);
                }

                match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            operation,
                            attempt = number,
                            ?delay,
                            error = %err,
                            "EasyCars call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        number += 1;
                    }
                    None => {
                        warn!(operation, attempts = number, error = %err, "EasyCars retries exhausted");
                        return Err(err);
                    }
                }
            }
        }
    }
}
