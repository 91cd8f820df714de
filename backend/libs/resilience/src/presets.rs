/// Retry schedules tuned for the collaborators of the inventory pipeline
///
/// Deadlines are not part of these presets; the service takes them from
/// its own configuration and applies them with `with_timeout`.
use crate::retry::RetryConfig;
use std::time::Duration;

/// Whole-event retries for idempotent work (thumbnail fetch and upload)
///
/// 3 retries, 200ms doubling to a 5s cap
pub fn image_fetch_config() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_backoff: Duration::from_millis(200),
        max_backoff: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

/// Version-conflict retries on conditional record writes
///
/// 5 retries with short backoff; conflicts clear quickly
pub fn record_store_config() -> RetryConfig {
    RetryConfig {
        max_retries: 5,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(500),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

/// Event source reconnects after transport errors
///
/// 10 reconnects, backoff capped at 60s
pub fn event_source_reconnect_config() -> RetryConfig {
    RetryConfig {
        max_retries: 10,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(60),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_have_bounded_backoff() {
        for config in [
            image_fetch_config(),
            record_store_config(),
            event_source_reconnect_config(),
        ] {
            assert!(config.initial_backoff <= config.max_backoff);
            assert!(config.max_retries > 0);
        }
    }

    #[test]
    fn test_conflict_retries_back_off_faster_than_fetches() {
        assert!(record_store_config().initial_backoff < image_fetch_config().initial_backoff);
    }
}
