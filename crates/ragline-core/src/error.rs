use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of the external generation model. Always surfaced to the caller.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("generation backend returned an empty completion")]
    EmptyResponse,

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid generation configuration: {0}")]
    Config(String),
}
