//! Top-level errors for configuration loading and the replay tool.

use thiserror::Error;

/// Errors that surface outside the orchestration boundary.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Config parse error: {0}")]
    ConfigParseError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::SerializationError(e.to_string())
    }
}
