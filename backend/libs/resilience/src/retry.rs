/// Retry policy with exponential backoff and jitter
use crate::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first call)
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The classifier rejected the error; no further attempts were made
    #[error("{0}")]
    Permanent(E),
    /// Every allowed attempt failed; `last` is the final error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying error, whichever way the retry loop ended
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Execute a future with retry logic, retrying every error
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(config, |_: &E| true, f).await
}

/// Execute a future with retry logic, retrying only errors accepted by `should_retry`
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: RetryConfig,
    should_retry: P,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut backoff = Backoff::new(config.clone());

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(RetryError::Permanent(e));
                }

                let Some(delay) = backoff.next_delay() else {
                    warn!(error = %e, "Max retries ({}) reached", config.max_retries);
                    return Err(RetryError::Exhausted {
                        attempts: config.max_retries + 1,
                        last: e,
                    });
                };

                warn!(
                    error = %e,
                    "Retry attempt {}/{}, waiting {:?}",
                    backoff.attempt(),
                    config.max_retries,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(RetryConfig::default(), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(quick(3), move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("temporary error")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_keeps_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(quick(2), move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move { Err::<i32, _>(format!("failure {count}")) }
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "failure 2");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry_if(
            quick(5),
            |e: &&str| *e == "transient",
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("permanent") }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Permanent("permanent"))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy_calls_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(RetryConfig::none(), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("error") }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        let start = std::time::Instant::now();

        let _ = with_retry(config, || async { Err::<i32, _>("error") }).await;

        // Expected: 10ms + 20ms + 40ms = 70ms minimum
        assert!(start.elapsed() >= Duration::from_millis(70));
    }
}
