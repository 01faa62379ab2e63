//! High-level operations for an ESP-AT WiFi module.
//!
//! [`EspClient`] wraps an [`esp_at_protocol::AtSession`] and offers the
//! everyday tasks built from its transactions:
//!
//! - module reset and echo-off ([`EspClient::init`])
//! - WiFi status and association ([`EspClient::is_wifi_connected`],
//!   [`EspClient::connect_wifi`])
//! - internet time over SNTP ([`EspClient::init_internet_time`],
//!   [`EspClient::update_internet_time`])
//! - ThingSpeak channel updates ([`EspClient::upload_thingspeak`])
//!
//! Like the session underneath, every operation reports failure as `false`
//! and logs the reason through `tracing`.

mod client;
mod config;
mod error;
mod thingspeak;
mod time;

pub use client::*;
pub use config::*;
pub use error::*;
pub use thingspeak::*;
pub use time::*;
