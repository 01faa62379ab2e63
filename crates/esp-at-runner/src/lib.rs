//! ESP-AT command-line runner.
//!
//! Connects to a module through a serial-to-TCP bridge and runs one
//! [`EspClient`](esp_at_client::EspClient) operation per invocation.
//! Settings come from an optional YAML file ([`config`]) with command-line
//! overrides ([`cli`]).

pub mod cli;
pub mod config;
mod error;
pub mod tcp;

pub use error::*;

use std::sync::Arc;

use esp_at_metrics::export::InMemoryRecorder;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Records from crates
/// logging through `log` are forwarded to the same subscriber.
pub fn init_logging(default_filter: &str) -> RunnerResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| {
            RunnerError::Logging(format!("invalid filter {:?}: {}", default_filter, e))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| RunnerError::Logging(e.to_string()))
}

/// Install an in-memory recorder as the global metrics recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn install_metrics() -> RunnerResult<Arc<InMemoryRecorder>> {
    let recorder = Arc::new(InMemoryRecorder::new());
    esp_at_metrics::metrics::set_global_recorder(recorder.clone())
        .map_err(|e| RunnerError::Metrics(e.to_string()))?;
    esp_at_metrics::describe_metrics();
    Ok(recorder)
}
