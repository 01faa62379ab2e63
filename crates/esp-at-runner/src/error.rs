//! Runner errors.

use esp_at_client::ClientError;
use thiserror::Error;

/// Errors that end a runner invocation.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ClientError),

    #[error("Missing setting: {0} (pass it on the command line or in the config file)")]
    MissingSetting(&'static str),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Metrics setup failed: {0}")]
    Metrics(String),

    /// The module did not complete the requested operation.
    #[error("{0} failed")]
    OperationFailed(&'static str),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
