//! Internet time through the module's SNTP client.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use esp_at_protocol::{
    AtCommand, Clock, SntpTime, Transport, DEFAULT_QUERY_TIMEOUT_MS, OK, SNTP_TIME_PREFIX,
};
use tracing::{debug, info, warn};

use crate::client::EspClient;
use crate::config::SntpConfig;

/// How long enabling SNTP may take.
pub const SNTP_CONFIG_TIMEOUT_MS: u64 = 500;

/// How long one time query may take.
pub const SNTP_QUERY_TIMEOUT_MS: u64 = 2_000;

/// How long to keep polling for a synchronised time.
pub const SNTP_SYNC_TIMEOUT_MS: u64 = 20_000;

/// Pause between polls while the module still reports 1970.
pub const SNTP_RETRY_INTERVAL: Duration = Duration::from_millis(100);

impl<T: Transport, C: Clock> EspClient<T, C> {
    /// Enable SNTP with `timezone` (hours from UTC, -11 to 13) and `server`.
    ///
    /// Resets the time state first; requires a WiFi connection.
    pub fn init_internet_time(&mut self, timezone: i8, server: &str) -> bool {
        self.time_initialized = false;
        self.time_updated = false;

        let config = SntpConfig {
            timezone,
            server: server.to_string(),
        };
        if let Err(e) = config.validate() {
            warn!("invalid SNTP configuration: {}", e);
            return false;
        }

        if !self.is_wifi_connected() {
            warn!("cannot configure SNTP without WiFi");
            return false;
        }

        let command = AtCommand::ConfigureSntp {
            timezone,
            server: server.to_string(),
        };
        if !self
            .session
            .execute(&command.encode(), Some(OK), SNTP_CONFIG_TIMEOUT_MS)
        {
            warn!(server, "failed to configure SNTP");
            return false;
        }

        info!(timezone, server, "SNTP configured");
        self.time_initialized = true;
        true
    }

    /// [`init_internet_time`](Self::init_internet_time) from config.
    pub fn init_internet_time_with(&mut self, config: &SntpConfig) -> bool {
        self.init_internet_time(config.timezone, &config.server)
    }

    /// Poll the module until it reports a synchronised time, then store it.
    ///
    /// Requires a WiFi connection and a prior successful
    /// [`init_internet_time`](Self::init_internet_time). Gives up after 20 s
    /// of unsynchronised answers, or at the first query with no answer.
    pub fn update_internet_time(&mut self) -> bool {
        self.time_updated = false;

        if !self.is_wifi_connected() {
            warn!("cannot update time without WiFi");
            return false;
        }

        if !self.time_initialized {
            warn!("SNTP not configured");
            return false;
        }

        let started = self.session.clock().now_ms();
        let time = loop {
            if self.session.clock().now_ms().saturating_sub(started) > SNTP_SYNC_TIMEOUT_MS {
                warn!("module did not synchronise within {} ms", SNTP_SYNC_TIMEOUT_MS);
                return false;
            }

            self.session.send(&AtCommand::QuerySntpTime.encode());
            let line = self.session.query(SNTP_TIME_PREFIX, SNTP_QUERY_TIMEOUT_MS);
            if line.is_empty() {
                warn!("no answer to SNTP time query");
                return false;
            }

            match SntpTime::parse(&line) {
                Ok(time) if time.is_synchronized() => break time,
                Ok(_) => debug!("module time not synchronised yet"),
                Err(e) => debug!("ignoring unreadable time {:?}: {}", line, e),
            }

            self.session.pause(SNTP_RETRY_INTERVAL);
        };

        if self.session.query(OK, DEFAULT_QUERY_TIMEOUT_MS).is_empty() {
            warn!("time query was not acknowledged");
            return false;
        }

        info!(
            "internet time {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            time.year, time.month, time.day, time.hour, time.minute, time.second
        );
        self.time = Some(time);
        self.time_updated = true;
        true
    }

    /// Whether SNTP has been configured.
    pub fn is_internet_time_initialized(&self) -> bool {
        self.time_initialized
    }

    /// Whether the last [`update_internet_time`](Self::update_internet_time)
    /// succeeded.
    pub fn is_internet_time_updated(&self) -> bool {
        self.time_updated
    }

    /// The most recently fetched time, if any.
    pub fn internet_time(&self) -> Option<&SntpTime> {
        self.time.as_ref()
    }

    /// The most recently fetched time as a calendar date-time.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        self.time.as_ref().and_then(to_datetime)
    }
}

/// Convert module time fields into a date-time, if they form a valid one.
pub fn to_datetime(time: &SntpTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(time.year as i32, time.month as u32, time.day as u32)?.and_hms_opt(
        time.hour as u32,
        time.minute as u32,
        time.second as u32,
    )
}
