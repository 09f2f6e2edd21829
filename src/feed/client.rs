//! Feed client
//!
//! Keeps a subscription to the upstream streamer alive for a fixed symbol
//! set. State moves `Disconnected -> Connecting -> Subscribed`, and any
//! transport failure or server close moves it to `ErrorBackoff` before the
//! next attempt. Every reconnect re-sends the full subscribe request.

use super::{decode_frame, ConnectionState};
use crate::fanout::{FanoutHub, FeedEvent};
use crate::pipeline::{Offer, QueueSender};
use crate::telemetry::{self, CounterMetric};
use crate::ws::{FeedTransport, Frame, WsError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// How the reconnect delay evolves across consecutive failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Always wait `reconnect_delay`
    #[default]
    Fixed,
    /// Double after each failure up to `max_reconnect_delay`; reset once
    /// subscribed
    Exponential,
}

/// Feed client configuration
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub symbols: Vec<String>,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub backoff: BackoffPolicy,
}

impl FeedClientConfig {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_delay: Duration::from_secs(60),
            backoff: BackoffPolicy::Fixed,
        }
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        match self.backoff {
            BackoffPolicy::Fixed => self.reconnect_delay,
            BackoffPolicy::Exponential => (current * 2).min(self.max_reconnect_delay),
        }
    }
}

/// Upstream subscription with reconnect handling
pub struct FeedClient {
    transport: Arc<dyn FeedTransport>,
    config: FeedClientConfig,
    queue: QueueSender,
    hub: Arc<FanoutHub>,
    state: watch::Sender<ConnectionState>,
}

impl FeedClient {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        config: FeedClientConfig,
        queue: QueueSender,
        hub: Arc<FanoutHub>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            config,
            queue,
            hub,
            state,
        }
    }

    /// Observe connection state changes
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// The control frame sent after every connect
    pub fn subscribe_message(&self) -> String {
        serde_json::json!({ "subscribe": self.config.symbols }).to_string()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        tracing::debug!(%state, "Feed state changed");
    }

    /// Run until `shutdown` becomes true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(symbols = ?self.config.symbols, "Feed client started");
        let mut delay = self.config.reconnect_delay;

        while !*shutdown.borrow() {
            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.session(&mut delay) => result,
            };

            match result {
                Ok(()) => tracing::warn!("Feed connection closed by server"),
                Err(e) => tracing::warn!(error = %e, "Feed connection failed"),
            }

            self.set_state(ConnectionState::ErrorBackoff);
            telemetry::increment(CounterMetric::Reconnects);
            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(delay) => {}
            }
            delay = self.config.next_delay(delay);
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Feed client stopped");
    }

    /// One connection lifetime. `Ok(())` means the server closed cleanly.
    async fn session(&self, delay: &mut Duration) -> Result<(), WsError> {
        self.set_state(ConnectionState::Connecting);
        let mut conn = self.transport.connect().await?;
        conn.send_text(self.subscribe_message()).await?;

        self.set_state(ConnectionState::Subscribed);
        *delay = self.config.reconnect_delay;
        tracing::info!(symbols = self.config.symbols.len(), "Subscribed to feed");

        while let Some(frame) = conn.next_frame().await? {
            self.handle_frame(frame).await;
        }
        Ok(())
    }

    async fn handle_frame(&self, frame: Frame) {
        telemetry::increment(CounterMetric::FramesReceived);

        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    telemetry::increment(CounterMetric::DecodeErrors);
                    tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame");
                    return;
                }
            },
        };

        let tick = match decode_frame(&text) {
            Ok(tick) => tick,
            Err(e) => {
                telemetry::increment(CounterMetric::DecodeErrors);
                tracing::warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        tracing::trace!(symbol = %tick.symbol, price = %tick.price, "Tick received");
        if self.queue.offer(tick.clone()) == Offer::Closed {
            tracing::debug!(symbol = %tick.symbol, "Ingestion queue closed, tick not queued");
        }
        self.hub.broadcast(&FeedEvent::PriceUpdate(tick)).await;
    }
}
