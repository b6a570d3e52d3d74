//! # Error Types
//!
//! Custom error types for VR DSU Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for VR DSU Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// DSU protocol errors (malformed or truncated datagrams)
    #[error("DSU protocol error: {0}")]
    Protocol(String),

    /// Controller slot outside 0-3
    #[error("Invalid controller slot: {0}")]
    InvalidSlot(u8),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Virtual gamepad feeder errors
    #[error("Feeder error: {0}")]
    Feeder(String),
}

/// Result type alias for VR DSU Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
