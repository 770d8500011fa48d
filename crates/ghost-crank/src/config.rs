//! Application configuration.

use std::path::Path;

use ghost_api::ApiConfig;
use ghost_core::Pubkey;
use ghost_envelope::{ExecutorPublicKey, KeySource};
use ghost_monitor::{MonitorConfig, PriceConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// `[executor]` section.
///
/// Without `key` the crank runs intake and status only; the monitor refuses
/// to start. `public_key` pins the expected key so a misconfigured secret
/// fails at startup instead of producing undecryptable orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub key: Option<KeySource>,
    #[serde(default)]
    pub public_key: Option<ExecutorPublicKey>,
}

/// `[ledger]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Program that owns nullifier accounts (hex).
    #[serde(default)]
    pub program_id: Pubkey,
    /// Perpetuals program targeted by emitted placements (hex).
    #[serde(default)]
    pub perp_program_id: Pubkey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Start the polling loop at boot when a key is configured.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_auto_start() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            executor: ExecutorConfig::default(),
            price: PriceConfig::default(),
            api: ApiConfig::default(),
            ledger: LedgerConfig::default(),
            auto_start: default_auto_start(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.monitor.max_submit_attempts == 0 {
            return Err(AppError::Config(
                "monitor.max_submit_attempts must be at least 1".to_string(),
            ));
        }
        if self.monitor.max_fetch_attempts == 0 {
            return Err(AppError::Config(
                "monitor.max_fetch_attempts must be at least 1".to_string(),
            ));
        }
        if self.monitor.retry_base_delay_ms > self.monitor.retry_max_delay_ms {
            return Err(AppError::Config(
                "monitor.retry_base_delay_ms exceeds retry_max_delay_ms".to_string(),
            ));
        }
        if self.executor.key.is_none() && self.executor.public_key.is_none() {
            return Err(AppError::Config(
                "executor.key or executor.public_key is required".to_string(),
            ));
        }
        Ok(())
    }
}
