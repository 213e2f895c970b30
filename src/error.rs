//! Error types for Switchboard gateway

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for Switchboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Switchboard gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Devices file could not be opened or read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Devices file is not a valid device list
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two devices share an id and the registry rejects duplicates
    #[error("duplicate device id in registry: {0}")]
    DuplicateDevice(String),

    /// Device id is absent from the registry or has no host
    #[error("invalid device id: {0}")]
    NotFound(String),

    /// Device is known but disabled
    #[error("The device is turned off: {0}")]
    Disabled(String),

    /// Device host does not form a valid backend address
    #[error("invalid device host: {0}")]
    InvalidHost(String),

    /// Forwarding to the device backend failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Telemetry publish failed
    #[error("notification error: {0}")]
    Notification(String),

    /// HTTP client error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// HTTP status used when this error is returned to a caller
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::InvalidHost(_) => StatusCode::BAD_REQUEST,
            Self::Disabled(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
