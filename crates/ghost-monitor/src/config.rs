//! Monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[monitor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Poll tick interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on every network call (price, ciphertext, ledger).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Failed submissions before an order is dropped to `error` for good.
    #[serde(default = "default_max_submit_attempts")]
    pub max_submit_attempts: u32,
    /// Consecutive failed price, ciphertext or account fetches before an
    /// order is dropped to `error` for good.
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Keep the nullifier account delegated after an execution.
    #[serde(default = "default_keep_delegated")]
    pub keep_delegated: bool,
    /// Event channel buffer. Slow subscribers past this lag drop events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_max_submit_attempts() -> u32 {
    3
}

fn default_max_fetch_attempts() -> u32 {
    10
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_keep_delegated() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_submit_attempts: default_max_submit_attempts(),
            max_fetch_attempts: default_max_fetch_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            keep_delegated: default_keep_delegated(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_section() {
        let config: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.max_submit_attempts, 3);
        assert_eq!(config.max_fetch_attempts, 10);
        assert!(config.keep_delegated);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_partial_override() {
        let config: MonitorConfig = toml::from_str("poll_interval_ms = 500").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.retry_max_delay_ms, 30_000);
    }
}
