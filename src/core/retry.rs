use std::future::Future;
use std::time::Duration;

use crate::core::error::SniperError;

/// Shared retry combinator for every outbound enricher: one timeout per
/// attempt, bounded attempts, exponential backoff, and a predicate deciding
/// which errors are worth another try.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub retryable: fn(&SniperError) -> bool,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            timeout,
            max_attempts: max_attempts.max(1),
            backoff_base,
            retryable: SniperError::is_transient,
        }
    }

    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, SniperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SniperError>>,
    {
        let mut delay = self.backoff_base;
        let mut last = SniperError::Timeout;
        for attempt in 1..=self.max_attempts {
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(SniperError::Timeout),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if (self.retryable)(&err) && attempt < self.max_attempts => {
                    tracing::debug!(
                        "{op_name} attempt {attempt}/{} failed ({err}), retrying in {:?}",
                        self.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    last = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_secs(1), 3, Duration::from_millis(1));
        let result = policy
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SniperError::TransientNet("flaky".into()))
                } else {
                    Ok(7u32)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_secs(1), 3, Duration::from_millis(1));
        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SniperError::EnrichmentMiss("gone".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_secs(1), 2, Duration::from_millis(1));
        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SniperError::TransientNet("down".into()))
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
