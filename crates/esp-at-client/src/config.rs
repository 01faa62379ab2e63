//! Configuration for the client operations.
//!
//! All sections deserialize from YAML (or any serde format); missing optional
//! fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Default NTP pool.
pub const DEFAULT_NTP_SERVER: &str = "0.europe.pool.ntp.org";

/// Default ThingSpeak endpoint.
pub const DEFAULT_THINGSPEAK_HOST: &str = "api.thingspeak.com";

/// Highest field number ThingSpeak accepts.
pub const MAX_THINGSPEAK_FIELDS: usize = 8;

/// Access point credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl WifiConfig {
    pub fn validate(&self) -> ClientResult<()> {
        if self.ssid.is_empty() {
            return Err(ClientError::MissingField("ssid"));
        }
        Ok(())
    }
}

/// SNTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SntpConfig {
    /// UTC offset in hours, -11 to 13.
    #[serde(default)]
    pub timezone: i8,
    #[serde(default = "default_ntp_server")]
    pub server: String,
}

impl Default for SntpConfig {
    fn default() -> Self {
        SntpConfig {
            timezone: 0,
            server: default_ntp_server(),
        }
    }
}

impl SntpConfig {
    pub fn validate(&self) -> ClientResult<()> {
        if !(-11..=13).contains(&self.timezone) {
            return Err(ClientError::InvalidTimezone(self.timezone));
        }
        if self.server.is_empty() {
            return Err(ClientError::MissingField("server"));
        }
        Ok(())
    }
}

/// ThingSpeak channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingSpeakConfig {
    #[serde(default = "default_thingspeak_host")]
    pub host: String,
    /// Channel write API key.
    pub api_key: String,
}

impl ThingSpeakConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        ThingSpeakConfig {
            host: default_thingspeak_host(),
            api_key: api_key.into(),
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.api_key.is_empty() {
            return Err(ClientError::MissingField("api_key"));
        }
        if self.host.is_empty() {
            return Err(ClientError::MissingField("host"));
        }
        Ok(())
    }
}

fn default_ntp_server() -> String {
    DEFAULT_NTP_SERVER.to_string()
}

fn default_thingspeak_host() -> String {
    DEFAULT_THINGSPEAK_HOST.to_string()
}
