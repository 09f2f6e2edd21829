//! WebSocket transport backed by tokio-tungstenite

use super::types::{Frame, WsConfig, WsError};
use super::{FeedConnection, FeedTransport};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens streamer connections with the configured handshake headers
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Create a new client with just a URL using default config
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl FeedTransport for WsClient {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, WsError> {
        tracing::info!(url = %self.config.url, "Connecting to WebSocket");

        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| WsError::InvalidRequest(e.to_string()))?;

        if let Some(origin) = &self.config.origin {
            let value =
                HeaderValue::from_str(origin).map_err(|e| WsError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(ORIGIN, value);
        }

        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let mut ping_interval = tokio::time::interval(self.config.ping_interval);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately; don't ping before the subscribe goes out
        ping_interval.reset();

        tracing::info!("WebSocket connected");

        Ok(Box::new(WsConnection {
            write,
            read,
            ping_interval,
            waiting_for_pong: false,
        }))
    }
}

/// One live streamer connection
pub struct WsConnection {
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
    ping_interval: Interval,
    waiting_for_pong: bool,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, WsError> {
        loop {
            tokio::select! {
                msg = self.read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => return Ok(Some(Frame::Text(text))),
                        Some(Ok(Message::Binary(data))) => return Ok(Some(Frame::Binary(data))),
                        Some(Ok(Message::Ping(data))) => {
                            self.write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Received close frame");
                            return Ok(None);
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                    }
                }

                _ = self.ping_interval.tick() => {
                    if self.waiting_for_pong {
                        return Err(WsError::PongTimeout);
                    }
                    self.write.send(Message::Ping(vec![])).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    self.waiting_for_pong = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ws_client_creation() {
        let client = WsClient::with_url("wss://example.com");
        assert_eq!(client.url(), "wss://example.com");
    }

    #[test]
    fn test_ws_client_with_config() {
        let config = WsConfig::new("wss://test.com").ping_interval(Duration::from_secs(15));

        let client = WsClient::new(config);
        assert_eq!(client.url(), "wss://test.com");
        assert_eq!(client.config.ping_interval, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_ws_client_connection_failure() {
        let client = WsClient::with_url("ws://127.0.0.1:1");
        let result = client.connect().await;
        assert!(matches!(result, Err(WsError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_ws_client_invalid_url() {
        let client = WsClient::with_url("not a url");
        let result = client.connect().await;
        assert!(matches!(result, Err(WsError::InvalidRequest(_))));
    }
}
