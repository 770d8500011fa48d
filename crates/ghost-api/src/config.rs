//! API server configuration.

use serde::{Deserialize, Serialize};

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between `ping` events on the stream.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Maximum concurrent stream connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Bearer token for mutating routes (unset = open).
    #[serde(default)]
    pub token: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

fn default_max_connections() -> usize {
    32
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_connections: default_max_connections(),
            token: None,
        }
    }
}

impl ApiConfig {
    pub fn auth_enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
