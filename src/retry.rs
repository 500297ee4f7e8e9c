//! Retry configuration and the shared retry helper.
//!
//! Backoff is linear: the wait before attempt `n + 1` is `delay * n`.
//! The [`GovernedAdvisor`](crate::GovernedAdvisor) uses [`with_retry`],
//! which retries only transient errors and honours retry hints.
//! [`ApiClient::with_retry`](crate::ApiClient::with_retry) uses
//! [`with_linear_retry`], which retries every failure on the plain
//! linear schedule.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{Result, SmartSpendError};

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use smartspend::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number. Default: 1s.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait after the given failed attempt (1-indexed): `delay * attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }

    /// Calculate the effective delay, respecting `retry_after` hints.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

#[derive(Debug, Clone, Copy)]
enum Policy {
    /// Retry transient errors; a retry hint replaces the backoff.
    Transient,
    /// Retry every error on the linear schedule.
    Every,
}

/// Execute an async operation with retry logic.
///
/// Retries transient errors (see [`SmartSpendError::is_transient`]) up to
/// `config.max_attempts` times with linear backoff. Permanent errors are
/// returned immediately. After the last attempt fails the error reads
/// `Failed after <n> attempts: <last error>`.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(config, operation, Policy::Transient, f).await
}

/// Like [`with_retry`], but every error is retried and the wait is always
/// `delay * attempt`, whatever the error says.
pub async fn with_linear_retry<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(config, operation, Policy::Every, f).await
}

async fn run<F, Fut, T>(config: &RetryConfig, operation: &str, policy: Policy, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        let e = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        let delay = match policy {
            Policy::Transient if !e.is_transient() => return Err(e), // permanent error, no retry
            Policy::Transient => config.effective_delay(attempt, e.retry_after()),
            Policy::Every => config.delay_for_attempt(attempt),
        };
        if attempt < attempts {
            metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                .increment(1);
            warn!(
                operation,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "retrying after failed attempt"
            );
            tokio::time::sleep(delay).await;
        }
        last_err = Some(e);
    }
    let last = last_err.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
    Err(SmartSpendError::Failed(format!(
        "Failed after {attempts} attempts: {last}"
    )))
}
