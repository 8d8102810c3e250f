//! Error types for wirecall.
//!
//! None of these cross the public call contract of a remote function: the
//! invoker absorbs them into the dispatch state's `responsive` flag. They are
//! still used internally so every fallible step can be written with `?`, and
//! they surface directly from configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wirecall.
#[derive(Debug, Error)]
pub enum WirecallError {
    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Payload errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Malformed response payload: {message}")]
    Payload { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid header {name:?}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for wirecall operations.
pub type Result<T> = std::result::Result<T, WirecallError>;

impl From<std::io::Error> for WirecallError {
    fn from(err: std::io::Error) -> Self {
        WirecallError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for WirecallError {
    fn from(err: serde_json::Error) -> Self {
        WirecallError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl WirecallError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        WirecallError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this error came from the transport rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WirecallError::Network { .. } | WirecallError::Timeout(_)
        )
    }
}
