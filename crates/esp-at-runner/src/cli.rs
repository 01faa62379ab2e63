//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use esp_at_client::{EspClient, SntpConfig, ThingSpeakConfig, WifiConfig};
use esp_at_protocol::{AtSession, Clock, Transport, DEFAULT_EXECUTE_TIMEOUT_MS};
use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::tcp::{SystemClock, TcpTransport};

/// Drive an ESP32 running ESP-AT firmware through a serial-to-TCP bridge.
#[derive(Debug, Parser)]
#[command(name = "esp-at", author, version, about)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bridge address (host:port); overrides the config file.
    #[arg(short, long, global = true)]
    pub address: Option<String>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Print the recorded driver metrics after the command.
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Factory-reset the module and disable echo.
    Init,

    /// Report whether the module is connected to an access point.
    Status,

    /// Join an access point.
    Connect {
        /// Network name; defaults to `wifi.ssid` from the config file.
        #[arg(long)]
        ssid: Option<String>,
        /// Network password; defaults to `wifi.password`.
        #[arg(long)]
        password: Option<String>,
    },

    /// Enable SNTP and print the synchronised time.
    Time {
        /// UTC offset in hours (-11 to 13).
        #[arg(long, allow_hyphen_values = true)]
        timezone: Option<i8>,
        /// NTP server.
        #[arg(long)]
        server: Option<String>,
    },

    /// Upload field values to a ThingSpeak channel.
    Thingspeak {
        /// Channel write API key; defaults to `thingspeak.api_key`.
        #[arg(long)]
        api_key: Option<String>,
        /// API host; defaults to `thingspeak.host`.
        #[arg(long)]
        host: Option<String>,
        /// Values for field1 to field8, in order.
        #[arg(required = true, num_args = 1..=8, allow_negative_numbers = true)]
        fields: Vec<f64>,
    },

    /// Send one AT command and print the response.
    Raw {
        /// Command line without CRLF, e.g. `AT+GMR`.
        command: String,
        /// Wait for a line containing this text.
        #[arg(long)]
        expect: Option<String>,
        /// How long to wait, in milliseconds.
        #[arg(long, default_value_t = DEFAULT_EXECUTE_TIMEOUT_MS)]
        timeout: u64,
    },
}

impl Cli {
    /// The configuration file contents with command-line overrides applied.
    pub fn resolve_config(&self) -> RunnerResult<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load(path)?,
            None => RunnerConfig::default(),
        };
        if let Some(address) = &self.address {
            config.transport.address = address.clone();
        }
        Ok(config)
    }
}

/// Connect to the configured bridge and run `cli.command`.
pub fn run(cli: &Cli) -> RunnerResult<()> {
    let config = cli.resolve_config()?;

    let transport = TcpTransport::connect(
        &config.transport.address,
        Duration::from_millis(config.transport.connect_timeout_ms),
    )?;
    info!(address = %config.transport.address, "connected");

    let session = AtSession::with_config(
        transport,
        SystemClock::new(),
        config.session.session_config(),
    )
    .with_device_label(config.session.device.clone());
    let mut client = EspClient::new(session);

    execute(&mut client, &cli.command, &config)
}

/// Run one command against `client`.
pub fn execute<T: Transport, C: Clock>(
    client: &mut EspClient<T, C>,
    command: &Command,
    config: &RunnerConfig,
) -> RunnerResult<()> {
    match command {
        Command::Init => {
            ensure(client.init(), "init")?;
            println!("initialized");
        }

        Command::Status => {
            let status = client.connection_status();
            debug!(?status, "status");
            match status.code {
                Some(code) => println!("STATUS:{}", code),
                None => println!("no status"),
            }
            println!(
                "{}",
                if status.is_connected() { "connected" } else { "not connected" }
            );
        }

        Command::Connect { ssid, password } => {
            let wifi = wifi_settings(config, ssid.as_deref(), password.as_deref())?;
            wifi.validate()?;
            ensure(client.connect_wifi_with(&wifi), "connect")?;
            println!("connected to {}", wifi.ssid);
        }

        Command::Time { timezone, server } => {
            let sntp = SntpConfig {
                timezone: timezone.unwrap_or(config.sntp.timezone),
                server: server.clone().unwrap_or_else(|| config.sntp.server.clone()),
            };
            sntp.validate()?;
            ensure(client.init_internet_time_with(&sntp), "SNTP configuration")?;
            ensure(client.update_internet_time(), "time update")?;
            match client.datetime() {
                Some(datetime) => println!("{}", datetime),
                None => return Err(RunnerError::OperationFailed("time conversion")),
            }
        }

        Command::Thingspeak {
            api_key,
            host,
            fields,
        } => {
            let channel = thingspeak_settings(config, api_key.as_deref(), host.as_deref())?;
            channel.validate()?;
            ensure(client.upload_thingspeak_with(&channel, fields), "upload")?;
            println!("uploaded {} fields", fields.len());
        }

        Command::Raw {
            command,
            expect,
            timeout,
        } => {
            let matched = client
                .session_mut()
                .execute(command, expect.as_deref(), *timeout);
            ensure(matched, "command")?;
            println!("OK");
        }
    }
    Ok(())
}

fn ensure(succeeded: bool, operation: &'static str) -> RunnerResult<()> {
    if succeeded {
        Ok(())
    } else {
        Err(RunnerError::OperationFailed(operation))
    }
}

/// WiFi credentials from flags, falling back to the config file.
pub fn wifi_settings(
    config: &RunnerConfig,
    ssid: Option<&str>,
    password: Option<&str>,
) -> RunnerResult<WifiConfig> {
    let file = config.wifi.as_ref();
    let ssid = ssid
        .map(str::to_string)
        .or_else(|| file.map(|wifi| wifi.ssid.clone()))
        .ok_or(RunnerError::MissingSetting("ssid"))?;
    let password = password
        .map(str::to_string)
        .or_else(|| file.map(|wifi| wifi.password.clone()))
        .unwrap_or_default();
    Ok(WifiConfig { ssid, password })
}

/// ThingSpeak channel from flags, falling back to the config file.
pub fn thingspeak_settings(
    config: &RunnerConfig,
    api_key: Option<&str>,
    host: Option<&str>,
) -> RunnerResult<ThingSpeakConfig> {
    let file = config.thingspeak.as_ref();
    let api_key = api_key
        .map(str::to_string)
        .or_else(|| file.map(|channel| channel.api_key.clone()))
        .ok_or(RunnerError::MissingSetting("api_key"))?;

    let mut channel = ThingSpeakConfig::new(api_key);
    if let Some(host) = host.map(str::to_string).or_else(|| file.map(|c| c.host.clone())) {
        channel.host = host;
    }
    Ok(channel)
}
