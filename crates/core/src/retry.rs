//! Retry coordinator.
//!
//! Wraps one unit of work (processing one file) with bounded, classified
//! retries and exponential backoff. Only errors classified as transient are
//! retried; everything else is assumed deterministic and surfaces
//! immediately. The coordinator converts failures into structured results
//! and per-attempt log records; the continue-vs-abort-batch policy lives in
//! the orchestrator.

use crate::error_log::ErrorLogEntry;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Error codes classified as transient and eligible for retry.
pub const RETRYABLE_CODES: &[&str] = &["EAGAIN", "EBUSY", "ETIMEDOUT", "ECONNRESET", "ENOTFOUND"];

/// Message substring the large-file-retrieval tool emits when a pointer file
/// cannot be fetched. Such failures are transient regardless of code.
pub const FETCH_FAILURE_MARKER: &str = "Error downloading object";

/// A failure from one unit of work, carrying an optional machine-readable code.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct WorkError {
    pub message: String,
    pub code: Option<String>,
}

impl WorkError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code<S: Into<String>, C: Into<String>>(message: S, code: C) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Classify this error as transient (worth retrying) or terminal.
    pub fn is_retryable(&self) -> bool {
        if let Some(code) = &self.code {
            if RETRYABLE_CODES.contains(&code.as_str()) {
                return true;
            }
        }
        self.message.contains(FETCH_FAILURE_MARKER)
    }
}

/// Retry knobs, taken from the recovery configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per unit of work.
    pub max_attempts: u32,
    /// Base delay before the second attempt.
    pub base_delay: Duration,
    /// Double the delay after each failed attempt.
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    ///
    /// `base × 2^(attempt-1)` with exponential backoff, else a flat `base`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.exponential_backoff {
            self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
        } else {
            self.base_delay
        }
    }
}

/// Structured result of one retry-wrapped unit of work.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result: the value, or the last error once attempts were
    /// exhausted or a non-retryable error occurred.
    pub result: Result<T, WorkError>,
    /// Number of attempts actually made.
    pub attempts: u32,
    /// One record per failed attempt, in order. The caller owns log storage.
    pub failures: Vec<ErrorLogEntry>,
}

/// Run one unit of work with bounded, classified retries.
///
/// Attempts the operation up to `policy.max_attempts` times, suspending for
/// the backoff delay between attempts. Returns immediately on success or on
/// a non-retryable failure.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    file: &Path,
    operation: &str,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WorkError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut failures = Vec::new();
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    failures,
                };
            }
            Err(error) => {
                failures.push(ErrorLogEntry::new(file, &error, attempt, operation));

                if !error.is_retryable() || attempt >= max_attempts {
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt,
                        failures,
                    };
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(
                    file = %file.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
