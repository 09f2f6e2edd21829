//! Upstream streaming transport
//!
//! The feed client talks to [`FeedTransport`] / [`FeedConnection`] so the
//! reconnect state machine can run against a scripted transport in tests.

mod client;
mod types;

pub use client::{WsClient, WsConnection};
pub use types::{Frame, WsConfig, WsError, DEFAULT_ORIGIN, DEFAULT_STREAM_URL};

use async_trait::async_trait;

/// Opens connections to the upstream feed
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Open a fresh connection (handshake included)
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, WsError>;
}

/// A single open connection
#[async_trait]
pub trait FeedConnection: Send {
    /// Send a text control frame
    async fn send_text(&mut self, text: String) -> Result<(), WsError>;

    /// Wait for the next data frame. `Ok(None)` means the server closed the
    /// connection.
    async fn next_frame(&mut self) -> Result<Option<Frame>, WsError>;
}
