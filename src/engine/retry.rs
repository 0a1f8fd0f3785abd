//! Bounded retry with fixed backoff for a single network operation.
//!
//! This module provides [`RetryPolicy`], the per-attempt [`RetryOutcome`]
//! classification, and [`run_with_retry`] which drives an operation until it
//! succeeds, fails terminally, or exhausts its attempts.
//!
//! # Overview
//!
//! Each attempt of an operation is classified as:
//! - [`RetryOutcome::Success`] - Done, return the value
//! - [`RetryOutcome::RetryableFailure`] - Sleep the backoff delay and try again
//! - [`RetryOutcome::TerminalFailure`] - Stop immediately, retry would not help
//!
//! Attempts for one identity are strictly sequential. Backoff sleeps only
//! suspend the calling task, so other identities keep making progress.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use loadtest_core::engine::{Phase, RetryOutcome, RetryPolicy, run_with_retry};
//!
//! # async fn example() {
//! let policy = RetryPolicy::new(3, Duration::from_millis(10));
//! let report = run_with_retry(&policy, Phase::Register, "user1", |attempt| async move {
//!     if attempt < 2 {
//!         RetryOutcome::RetryableFailure("status 503".to_string())
//!     } else {
//!         RetryOutcome::Success(())
//!     }
//! })
//! .await;
//! assert!(report.result.is_ok());
//! assert_eq!(report.attempts, 2);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::Phase;

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Classification of one attempt of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed in a way another attempt may fix.
    ///
    /// Examples: network error, timeout, unexpected status.
    RetryableFailure(String),
    /// The attempt failed in a way no retry can fix.
    TerminalFailure(String),
}

/// Final failure of an operation after retries were exhausted or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalFailure {
    /// Reason reported by the last attempt.
    pub reason: String,
}

impl fmt::Display for TerminalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Result of driving an operation through [`run_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport<T> {
    /// Success value or the terminal failure.
    pub result: Result<T, TerminalFailure>,
    /// Number of attempts performed (always at least 1).
    pub attempts: u32,
}

/// Retry configuration: bounded attempts with a fixed backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `backoff`: 2 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
    /// Delay slept between consecutive attempts.
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed backoff delay.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

/// Runs `operation` under `policy`.
///
/// The closure receives the 1-indexed attempt number. Every failed attempt is
/// logged with the phase tag, the username, and `attempt/max`.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    phase: Phase,
    username: &str,
    mut operation: F,
) -> RetryReport<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RetryOutcome<T>>,
{
    let max = policy.max_attempts;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(phase = %phase, username, attempt, "attempting operation");

        let reason = match operation(attempt).await {
            RetryOutcome::Success(value) => {
                return RetryReport {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            RetryOutcome::TerminalFailure(reason) => {
                warn!(
                    "[{}][-] {} failed terminally (attempt {}/{}): {}",
                    phase.tag(),
                    username,
                    attempt,
                    max,
                    reason
                );
                return RetryReport {
                    result: Err(TerminalFailure { reason }),
                    attempts: attempt,
                };
            }
            RetryOutcome::RetryableFailure(reason) => reason,
        };

        warn!(
            "[{}][-] {} failed (attempt {}/{}): {}",
            phase.tag(),
            username,
            attempt,
            max,
            reason
        );

        if attempt >= max {
            warn!(
                "[{}][-] {} failed after {} attempts",
                phase.tag(),
                username,
                max
            );
            return RetryReport {
                result: Err(TerminalFailure { reason }),
                attempts: attempt,
            };
        }

        info!(
            "[{}][RETRY] retrying {} in {}ms",
            phase.tag(),
            username,
            policy.backoff.as_millis()
        );
        tokio::time::sleep(policy.backoff).await;
    }
}
