//! Crate-level error type

use thiserror::Error;

/// Errors raised while configuring wrappers or exporting their data
///
/// Failures of the wrapped functions themselves are never reported through
/// this type; see [`crate::CallFailure`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid settings: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for callwrap operations
pub type Result<T> = std::result::Result<T, Error>;
