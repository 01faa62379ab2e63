//! The client handle and its WiFi operations.

use esp_at_protocol::{
    AtCommand, AtSession, Clock, ConnectionStatus, SntpTime, Transport,
    DEFAULT_EXECUTE_TIMEOUT_MS, DEFAULT_QUERY_TIMEOUT_MS, OK, STATUS_PREFIX,
};
use tracing::{debug, info, warn};

use crate::config::WifiConfig;

/// How long a status query may take.
pub const STATUS_TIMEOUT_MS: u64 = 1_000;

/// How long joining an access point may take.
pub const JOIN_TIMEOUT_MS: u64 = 20_000;

/// High-level operations on one ESP-AT module.
///
/// Owns the [`AtSession`] and the internet-time state. Every operation is a
/// short sequence of `execute`/`query` calls and reports failure as `false`.
pub struct EspClient<T, C> {
    pub(crate) session: AtSession<T, C>,
    pub(crate) time_initialized: bool,
    pub(crate) time_updated: bool,
    pub(crate) time: Option<SntpTime>,
}

impl<T: Transport, C: Clock> EspClient<T, C> {
    /// Wrap a session.
    pub fn new(session: AtSession<T, C>) -> Self {
        EspClient {
            session,
            time_initialized: false,
            time_updated: false,
            time: None,
        }
    }

    pub fn session(&self) -> &AtSession<T, C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AtSession<T, C> {
        &mut self.session
    }

    pub fn into_session(self) -> AtSession<T, C> {
        self.session
    }

    /// Factory-reset the module and disable echo.
    pub fn init(&mut self) -> bool {
        self.session.initialize()
    }

    /// Whether [`init`](Self::init) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    /// Ask the module for its connection status.
    pub fn connection_status(&mut self) -> ConnectionStatus {
        self.session.send(&AtCommand::Status.encode());
        let line = self.session.query(STATUS_PREFIX, STATUS_TIMEOUT_MS);

        // Drain the trailing OK so it cannot satisfy a later wait.
        self.session.query(OK, DEFAULT_QUERY_TIMEOUT_MS);

        let status = ConnectionStatus::parse(&line);
        debug!(?status, "connection status");
        status
    }

    /// Whether the module is associated with an access point.
    pub fn is_wifi_connected(&mut self) -> bool {
        self.connection_status().is_connected()
    }

    /// Switch to station mode and join `ssid`.
    pub fn connect_wifi(&mut self, ssid: &str, password: &str) -> bool {
        if !self.session.execute(
            &AtCommand::SetStationMode.encode(),
            Some(OK),
            DEFAULT_EXECUTE_TIMEOUT_MS,
        ) {
            warn!("failed to switch to station mode");
        }

        let join = AtCommand::JoinAccessPoint {
            ssid: ssid.to_string(),
            password: password.to_string(),
        };
        let joined = self.session.execute(&join.encode(), Some(OK), JOIN_TIMEOUT_MS);
        if joined {
            info!(ssid, "joined access point");
        } else {
            warn!(ssid, "failed to join access point");
        }
        joined
    }

    /// [`connect_wifi`](Self::connect_wifi) with credentials from config.
    pub fn connect_wifi_with(&mut self, config: &WifiConfig) -> bool {
        if let Err(e) = config.validate() {
            warn!("invalid WiFi configuration: {}", e);
            return false;
        }
        self.connect_wifi(&config.ssid, &config.password)
    }
}
