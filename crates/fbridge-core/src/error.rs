//! Unified error types for fbridge

use thiserror::Error;

/// Unified error type for all delivery operations
#[derive(Error, Debug)]
pub enum FbridgeError {
    // Input errors, never reach the network
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Preferred channel unreachable, recovered by switching transport
    #[error("Relay unavailable: {0}")]
    TransportUnavailable(String),

    // Backend errors
    #[error("Failed to parse backend response: HTTP {status}")]
    ResponseParseFailure { status: u16 },

    #[error("{message}")]
    BackendRejected { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Unknown(String),
}

impl FbridgeError {
    /// True for errors that mean "the relay never answered" rather than
    /// "the relay answered with a failure"
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_))
    }
}

/// Result type alias using FbridgeError
pub type Result<T> = std::result::Result<T, FbridgeError>;
