//! Error Handling and Retry Logic
//!
//! Bounded retries with exponential backoff for calls against the Slack Web
//! API. Errors decide for themselves whether another attempt makes sense via
//! [`Retryable`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a no-retry policy
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Near-instant retries, used by tests and local stubs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    /// Delay to wait before the attempt following `current`.
    fn next_delay(&self, current: Duration) -> Duration {
        Duration::from_secs_f64(
            (current.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Errors that know whether a failed call is worth repeating.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-provided hint for how long to back off.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Execute `operation` until it succeeds, fails with a non-retryable error,
/// or the policy runs out of attempts. The last error is returned as is.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempts >= max_attempts => return Err(e),
            Err(e) => {
                let wait = e
                    .retry_after()
                    .map_or(delay, |hint| hint.max(delay))
                    .min(policy.max_delay);

                warn!(
                    call = label,
                    attempt = attempts,
                    max_attempts,
                    error = %e,
                    "call failed, retrying in {:?}",
                    wait
                );

                sleep(wait).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
