//! Bounded retry with exponential backoff for transient fetch failures.

use std::time::Duration;

use crate::infrastructure::config::RetryConfig;
use crate::infrastructure::http_client::FetchFailure;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_factor: f64,
    pub jitter_enabled: bool,
}

impl RetryPolicy {
    pub const fn new(
        max_attempts: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
        exponential_factor: f64,
        jitter_enabled: bool,
    ) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            exponential_factor,
            jitter_enabled,
        }
    }

    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts.max(1),
            config.base_delay_ms,
            config.max_delay_ms,
            config.exponential_factor,
            config.jitter_enabled,
        )
    }

    /// `attempts` is the number of attempts already made
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Retry only transient failures while attempts remain
    #[must_use]
    pub fn should_retry_failure(&self, failure: &FetchFailure, attempts: u32) -> bool {
        self.should_retry(attempts) && failure.is_retryable()
    }

    /// Delay before retry number `retry` (1-based): `base * factor^(retry-1)`,
    /// capped at `max_delay_ms`, then spread by up to ±25% when jitter is on.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let exponential = (self.base_delay_ms as f64 * self.exponential_factor.powi(exponent)) as u64;
        let mut delay = exponential.min(self.max_delay_ms);

        if self.jitter_enabled && delay > 0 {
            let jitter_range = delay / 4;
            let jitter = fastrand::u64(0..=jitter_range * 2);
            delay = (delay + jitter).saturating_sub(jitter_range);
        }
        Duration::from_millis(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
