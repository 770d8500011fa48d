//! Retry policy for submissions and transient fetches.

use std::time::Duration;

use crate::config::MonitorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub max_fetch_attempts: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            max_attempts: config.max_submit_attempts,
            max_fetch_attempts: config.max_fetch_attempts,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// No retries left after `attempts` failures.
    #[must_use]
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Give up after `failures` consecutive failed fetches.
    #[must_use]
    pub fn fetch_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_fetch_attempts
    }
}
