//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working relay.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::RelayError;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV: &str = "LINE_RELAY_CONFIG";

/// Relay settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listen address for the TCP accept loop
    pub bind_addr: String,
    /// Inactivity window before a session is evicted
    pub idle_timeout_ms: u64,
    /// Capacity of the relay's inbound queue
    pub relay_capacity: usize,
    /// Capacity of each session's outbound queue
    pub outbound_capacity: usize,
    /// Longest accepted inbound line, in bytes
    pub max_line_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8888".to_string(),
            idle_timeout_ms: 10_000,
            relay_capacity: 256,
            outbound_capacity: 64,
            max_line_length: 4096,
        }
    }
}

impl RelayConfig {
    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RelayConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load from `LINE_RELAY_CONFIG` if it is set, defaults otherwise
    pub fn from_env() -> Result<Self, RelayError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Reject values that would make the relay unusable
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.idle_timeout_ms == 0 {
            return Err(RelayError::Config("idle_timeout_ms must be > 0".to_string()));
        }
        if self.relay_capacity == 0 || self.outbound_capacity == 0 {
            return Err(RelayError::Config("queue capacities must be > 0".to_string()));
        }
        if self.max_line_length == 0 {
            return Err(RelayError::Config("max_line_length must be > 0".to_string()));
        }
        Ok(())
    }

    /// Idle window as a `Duration`
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}
