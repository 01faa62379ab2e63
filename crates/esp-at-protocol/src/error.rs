//! Error types for the AT protocol.

use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("transport closed")]
    Closed,
}

/// Errors that can occur while running an AT transaction.
///
/// None of these are fatal: the engine's boolean/string entry points degrade
/// every variant to `false` or an empty string.
#[derive(Debug, Error)]
pub enum AtError {
    /// The deadline elapsed without a matching line.
    #[error("timed out after {timeout_ms} ms waiting for {target:?}")]
    Timeout {
        /// Substring that was awaited.
        target: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// An error marker line arrived while waiting for success.
    #[error("modem reported failure: {line:?}")]
    Disqualified {
        /// The offending line.
        line: String,
    },

    /// A query timed out with nothing matching, including the raw-buffer check.
    #[error("no line matching {target:?}")]
    NoMatch {
        /// Substring that was awaited.
        target: String,
    },

    /// Reading from or writing to the modem failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A matched line could not be interpreted.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Result type alias for AT operations.
pub type AtResult<T> = Result<T, AtError>;
