// Bounded retry with exponential backoff for remote calls.
// No jitter and no circuit breaking: callers target a single known endpoint.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryConfig {
    /// Delay slept after the failure of the zero-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// All attempts failed. Carries the last underlying error.
#[derive(Debug, Error)]
#[error("operation failed after {attempts} attempts: {source}")]
pub struct RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    pub attempts: u32,
    #[source]
    pub source: E,
}

impl<E> RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    pub fn into_inner(self) -> E {
        self.source
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or `max_attempts` consecutive
    /// failures have been seen. After the failure of attempt `i` the task
    /// sleeps `base_delay * 2^i`; there is no sleep after the final attempt.
    ///
    /// A `max_attempts` of zero is treated as one attempt.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    debug!(attempt = attempt + 1, "Operation succeeded");
                    return Ok(value);
                }
                Err(error) if attempt + 1 < max_attempts => {
                    let delay = self.config.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Operation failed, retrying: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(attempts = max_attempts, "Operation failed, giving up: {}", error);
                    return Err(RetryExhausted {
                        attempts: max_attempts,
                        source: error,
                    });
                }
            }
        }
    }
}

/// Free-function form of [`RetryExecutor::execute`].
pub async fn retry<T, E, F, Fut>(
    operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    RetryExecutor::new(RetryConfig {
        max_attempts,
        base_delay,
    })
    .execute(operation)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[derive(Debug, Error)]
    #[error("flaky: {0}")]
    struct Flaky(u32);

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failure() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result = retry(
            move || {
                let counter = counter.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(Flaky(count))
                    } else {
                        Ok("success")
                    }
                }
            },
            3,
            Duration::from_millis(300),
        )
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_wraps_last_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();
        let started = Instant::now();

        let result: Result<(), _> = retry(
            move || {
                let counter = counter.clone();
                async move { Err(Flaky(counter.fetch_add(1, Ordering::SeqCst))) }
            },
            4,
            Duration::from_millis(100),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.source.0, 3);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 4);
        // 100 + 200 + 400, no sleep after the last attempt
        assert!(started.elapsed() >= Duration::from_millis(700));
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), _> = RetryExecutor::new(RetryConfig {
            max_attempts: 0,
            base_delay: Duration::from_millis(10),
        })
        .execute(move || {
            let counter = counter.clone();
            async move { Err(Flaky(counter.fetch_add(1, Ordering::SeqCst))) }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_millis(300));
        assert_eq!(config.delay_for(1), Duration::from_millis(600));
        assert_eq!(config.delay_for(2), Duration::from_millis(1200));
    }
}
