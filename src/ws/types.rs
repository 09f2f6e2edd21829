//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;

/// Streamer endpoint (version 1 sends raw base64 frames)
pub const DEFAULT_STREAM_URL: &str = "wss://streamer.finance.yahoo.com/";

/// Origin header the streamer requires to accept the handshake
pub const DEFAULT_ORIGIN: &str = "https://finance.yahoo.com";

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Value for the `Origin` handshake header
    pub origin: Option<String>,
    /// Interval for sending ping frames; a missing pong by the next tick
    /// is treated as a dead connection
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            origin: Some(DEFAULT_ORIGIN.to_string()),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the `Origin` header (None to omit it)
    pub fn origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }
}

/// Data frame received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// WebSocket errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WsError {
    /// Handshake request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Connection failed or was lost
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// Server did not answer a ping in time
    #[error("Pong timeout")]
    PongTimeout,
}
