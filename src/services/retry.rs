//! Retry policy with exponential backoff for synthesis calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::SynthesisError;
use crate::domain::models::RetryConfig;

/// Retries transient synthesis failures with exponential backoff.
///
/// Backoff doubles with each retry (`initial * 2^attempt`) up to `max_backoff_ms`.
/// Only errors for which [`SynthesisError::is_transient`] holds are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `operation`, retrying transient failures.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, SynthesisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SynthesisError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Synthesis call succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) if self.should_retry(&err, attempt) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        error = %err,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "Transient synthesis failure, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt >= self.max_retries && err.is_transient() {
                        warn!(attempts = attempt + 1, error = %err, "Synthesis failed after retries");
                    } else {
                        debug!(error = %err, "Permanent synthesis error, not retrying");
                    }
                    return Err(err);
                }
            }
        }
    }

    fn should_retry(&self, err: &SynthesisError, attempt: u32) -> bool {
        attempt < self.max_retries && err.is_transient()
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt);
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(multiplier)
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 100, 500);
        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(400));
        assert_eq!(policy.calculate_backoff(3), Duration::from_millis(500));
        assert_eq!(policy.calculate_backoff(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let policy = RetryPolicy::new(3, 1, 2);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(SynthesisError::EmptyResponse)
                    } else {
                        Ok("def test_ok(self):\n    pass".to_string())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, 1, 1);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<String, _> = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SynthesisError::Unavailable("503".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(SynthesisError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::new(3, 1, 1);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<String, _> = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SynthesisError::Auth("401".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
