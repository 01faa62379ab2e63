//! ThingSpeak channel updates over a plain TCP connection.

use std::fmt::Write as _;
use std::time::Duration;

use esp_at_protocol::{url, AtCommand, Clock, Transport, OK};
use tracing::{debug, info, warn};

use crate::client::EspClient;
use crate::config::{ThingSpeakConfig, MAX_THINGSPEAK_FIELDS};
use crate::error::{ClientError, ClientResult};

/// HTTP port of the ThingSpeak API.
pub const THINGSPEAK_PORT: u16 = 80;

/// How long connecting and uploading may each take.
pub const THINGSPEAK_TIMEOUT_MS: u64 = 1_000;

/// Settle time after each step.
const SETTLE: Duration = Duration::from_millis(100);

/// Build the update request line for `api_key` and `fields`.
///
/// Field numbers start at 1 in slice order.
pub fn update_request(api_key: &str, fields: &[f64]) -> ClientResult<String> {
    if fields.len() > MAX_THINGSPEAK_FIELDS {
        return Err(ClientError::TooManyFields {
            max: MAX_THINGSPEAK_FIELDS,
            actual: fields.len(),
        });
    }
    if api_key.is_empty() {
        return Err(ClientError::MissingField("api_key"));
    }

    let mut request = format!("GET /update?api_key={}", url::encode(api_key));
    for (index, value) in fields.iter().enumerate() {
        let _ = write!(request, "&field{}={}", index + 1, value);
    }
    Ok(request)
}

impl<T: Transport, C: Clock> EspClient<T, C> {
    /// Post up to eight field values to a ThingSpeak channel.
    ///
    /// Returns whether the module acknowledged the upload.
    pub fn upload_thingspeak(&mut self, host: &str, api_key: &str, fields: &[f64]) -> bool {
        let request = match update_request(api_key, fields) {
            Ok(request) => request,
            Err(e) => {
                warn!("cannot upload to ThingSpeak: {}", e);
                return false;
            }
        };

        if !self.is_wifi_connected() {
            warn!("cannot upload to ThingSpeak without WiFi");
            return false;
        }

        let connect = AtCommand::StartTcp {
            host: host.to_string(),
            port: THINGSPEAK_PORT,
        };
        self.session.send(&connect.encode());
        let connected = self.session.query(OK, THINGSPEAK_TIMEOUT_MS);
        self.session.pause(SETTLE);
        if connected != OK {
            warn!(host, "failed to open TCP connection");
            return false;
        }

        debug!("{}", request);
        if !self.session.send(&AtCommand::Send { len: request.len() + 2 }.encode())
            || !self.session.send(&request)
        {
            warn!(host, "failed to write ThingSpeak request");
            return false;
        }
        let uploaded = !self.session.query(OK, THINGSPEAK_TIMEOUT_MS).is_empty();
        self.session.pause(SETTLE);

        if uploaded {
            info!(host, fields = fields.len(), "uploaded to ThingSpeak");
        } else {
            warn!(host, "ThingSpeak upload was not acknowledged");
        }
        uploaded
    }

    /// [`upload_thingspeak`](Self::upload_thingspeak) with channel settings
    /// from config.
    pub fn upload_thingspeak_with(&mut self, config: &ThingSpeakConfig, fields: &[f64]) -> bool {
        if let Err(e) = config.validate() {
            warn!("invalid ThingSpeak configuration: {}", e);
            return false;
        }
        self.upload_thingspeak(&config.host, &config.api_key, fields)
    }
}
