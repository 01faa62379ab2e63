//! Runner configuration file.
//!
//! ```yaml
//! transport:
//!   address: 192.168.4.1:2323
//! session:
//!   device: weather-station
//!   poll_interval_ms: 2
//! wifi:
//!   ssid: home
//!   password: secret
//! sntp:
//!   timezone: 1
//! thingspeak:
//!   api_key: ABCDEF0123456789
//! ```
//!
//! Every section is optional. Command-line flags override file values.

use std::path::Path;

use esp_at_client::{SntpConfig, ThingSpeakConfig, WifiConfig};
use esp_at_protocol::{SessionConfig, DEFAULT_MAX_PENDING};
use serde::{Deserialize, Serialize};

use crate::error::RunnerResult;

/// Default bridge address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:2323";

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default device label for metrics.
pub const DEFAULT_DEVICE: &str = "esp32";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub transport: TransportSection,
    pub session: SessionSection,
    pub wifi: Option<WifiConfig>,
    pub sntp: SntpConfig,
    pub thingspeak: Option<ThingSpeakConfig>,
}

impl RunnerConfig {
    /// Read a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> RunnerResult<Self> {
        if text.trim().is_empty() {
            return Ok(RunnerConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Where the module's UART is exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// `host:port` of the serial bridge.
    pub address: String,
    pub connect_timeout_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        TransportSection {
            address: DEFAULT_ADDRESS.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// Transaction engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Label attached to recorded metrics.
    pub device: String,
    pub quiescence_ms: u64,
    pub poll_interval_ms: u64,
    pub max_pending: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        let engine = SessionConfig::default();
        SessionSection {
            device: DEFAULT_DEVICE.to_string(),
            quiescence_ms: engine.quiescence_ms,
            poll_interval_ms: engine.poll_interval_ms,
            max_pending: engine.max_pending,
        }
    }
}

impl SessionSection {
    /// Engine configuration for these settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            quiescence_ms: self.quiescence_ms,
            poll_interval_ms: self.poll_interval_ms,
            max_pending: if self.max_pending == 0 {
                DEFAULT_MAX_PENDING
            } else {
                self.max_pending
            },
        }
    }
}
