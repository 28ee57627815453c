//! Async patterns shared by the orchestration engine
//!
//! Retry with exponential backoff, per-call timeouts, and bounded
//! concurrent processing.

use crate::error::{CoreError, CoreResult};
use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Retry configuration with exponential backoff
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,
    /// Initial delay between attempts in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on the delay in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier applied after each failed attempt
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 15_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Compute the delay for the attempt that just failed (1-based)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exp);
        let capped = base.min(self.max_delay_ms as f64);
        let with_jitter = if self.jitter {
            // +/- 10% so concurrent retries do not stampede the provider
            let factor = 1.0 + (fastrand::f64() - 0.5) * 0.2;
            capped * factor
        } else {
            capped
        };
        Duration::from_millis(with_jitter.max(0.0) as u64)
    }
}

/// Retry an async operation, but only for errors the caller deems retryable.
///
/// Non-retryable errors are returned immediately; retryable ones are retried
/// up to `config.max_attempts` with exponential backoff.
pub async fn retry_if<T, E, F, Fut, P>(
    mut operation: F,
    config: &RetryConfig,
    retryable: P,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_attempts || !retryable(&error) {
                    return Err(error);
                }
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> CoreResult<T>
where
    F: Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(CoreError::timeout(operation_name, timeout_ms)),
    }
}

/// Process items concurrently with a fixed parallelism bound.
///
/// Completion order is unspecified; the output carries whatever the
/// processor produced, one entry per input item.
pub async fn process_concurrently<T, R, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    processor: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(processor)
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await
}
