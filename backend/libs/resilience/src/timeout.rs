/// Deadline wrapper for calls to external collaborators
///
/// The only failure this layer adds is the deadline itself; the wrapped
/// call's own `Result` is handed back untouched so callers keep their
/// error types.
use std::future::Future;
use std::time::Duration;

/// The deadline passed before the call completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {after:?}")]
pub struct TimeoutError {
    pub after: Duration,
}

/// Run `future` to completion or fail once `after` has passed
pub async fn with_timeout<F, T>(after: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| TimeoutError { after })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, String>(7) }).await;
        assert_eq!(result, Ok(Ok(7)));
    }

    #[tokio::test]
    async fn test_inner_error_is_passed_through() {
        let result = with_timeout(Duration::from_secs(1), async { Err::<u8, _>("refused") }).await;
        assert_eq!(result, Ok(Err("refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_reports_its_deadline() {
        let result = with_timeout(Duration::from_millis(50), std::future::pending::<()>()).await;

        let err = result.unwrap_err();
        assert_eq!(err.after, Duration::from_millis(50));
        assert_eq!(err.to_string(), "operation timed out after 50ms");
    }
}
