//! Error types for client configuration.

use thiserror::Error;

/// Errors detected before any command is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Timezone outside the range the firmware accepts.
    #[error("timezone {0} out of range (must be -11..=13)")]
    InvalidTimezone(i8),

    /// A required field was left empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Too many ThingSpeak fields.
    #[error("too many fields: max {max}, got {actual}")]
    TooManyFields { max: usize, actual: usize },
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
