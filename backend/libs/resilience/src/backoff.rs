/// Exponential backoff schedule with optional jitter
use crate::retry::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Stateful backoff schedule.
///
/// Each call to [`Backoff::next_delay`] returns the delay to wait before the
/// next attempt, or `None` once `max_retries` delays have been handed out.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    attempt: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        let current = config.initial_backoff;
        Self {
            config,
            attempt: 0,
            current,
        }
    }

    /// Number of delays handed out since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_retries
    }

    /// Start over from the initial delay (e.g. after a successful reconnect)
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current = self.config.initial_backoff;
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;

        let delay = apply_jitter(self.current, self.config.jitter).min(self.config.max_backoff);

        self.current = Duration::from_millis(
            ((self.current.as_millis() as f64 * self.config.backoff_multiplier)
                .min(self.config.max_backoff.as_millis() as f64)) as u64,
        );

        Some(delay)
    }
}

pub(crate) fn apply_jitter(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3); // ±30%
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}
