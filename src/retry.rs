//! Retry logic with fixed-delay backoff
//!
//! Transport calls to the generation service are retried a small, fixed number
//! of times with the same delay between attempts. Only transient failures are
//! retried; semantic failures (bad payloads, refusals) are surfaced at once.
//!
//! # Example
//!
//! ```no_run
//! use tirepress_gen::retry::{IsRetryable, with_fixed_retry};
//! use tirepress_gen::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_fixed_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::TransportError;
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx) should return `true`.
/// Permanent failures (authentication, bad request) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Connection(_) => true,
            // Pacing is the gateway's job, not the retry loop's
            TransportError::Throttled { .. } => false,
            // Server-side trouble may clear; client errors will not
            TransportError::Status { status, .. } => *status >= 500 || *status == 408,
        }
    }
}

/// Execute an async operation, retrying transient failures with a fixed delay
///
/// Makes at most `config.max_retries + 1` calls. Returns the first success, the
/// first non-retryable error, or the last error once retries are used up.
pub async fn with_fixed_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "call succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = config.max_retries,
                    delay_ms = config.delay.as_millis(),
                    "call failed, retrying"
                );

                tokio::time::sleep(config.delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "call failed after all retries"
                    );
                } else {
                    tracing::error!(error = %e, "call failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
