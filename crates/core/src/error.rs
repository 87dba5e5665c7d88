//! Error types for the rebid analysis workspace.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the rebid analysis workspace.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input table does not match the documented column contract.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Data error (invalid key values, inconsistent band layouts).
    #[error("Data error: {0}")]
    Data(String),

    /// Participant classification table error.
    #[error("Participant table error: {0}")]
    Participants(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a participant table error.
    pub fn participants(msg: impl Into<String>) -> Self {
        Error::Participants(msg.into())
    }
}
