//! Subscriber registry and best-effort broadcast

use super::FeedEvent;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Default per-subscriber outbound buffer
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// A live subscriber's receiving end
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// Pushes serialized events to every connected subscriber.
///
/// Broadcast never blocks on a subscriber: a full or closed outbound buffer
/// is logged and skipped. Removal is left to the connection that owns the
/// subscription.
pub struct FanoutHub {
    subscribers: RwLock<HashMap<Uuid, mpsc::Sender<Arc<str>>>>,
    buffer: usize,
}

impl FanoutHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Add a subscriber
    pub async fn connect(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, tx);
        let total = subscribers.len();
        drop(subscribers);

        telemetry::set_gauge(GaugeMetric::Subscribers, total as f64);
        tracing::info!(subscriber = %id, total, "Subscriber connected");

        Subscription { id, rx }
    }

    /// Remove a subscriber; returns false if it was not connected
    pub async fn disconnect(&self, id: Uuid) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(&id).is_some();
        let total = subscribers.len();
        drop(subscribers);

        if removed {
            telemetry::set_gauge(GaugeMetric::Subscribers, total as f64);
            tracing::info!(subscriber = %id, total, "Subscriber disconnected");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Send an event to every subscriber; returns the number of successful
    /// deliveries
    pub async fn broadcast(&self, event: &FeedEvent) -> usize {
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize fan-out event");
                return 0;
            }
        };

        let snapshot: Vec<(Uuid, mpsc::Sender<Arc<str>>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in snapshot {
            match tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    telemetry::increment(CounterMetric::FanoutFailures);
                    tracing::warn!(subscriber = %id, "Subscriber buffer full, skipping event");
                }
                Err(TrySendError::Closed(_)) => {
                    telemetry::increment(CounterMetric::FanoutFailures);
                    tracing::debug!(subscriber = %id, "Subscriber gone, skipping event");
                }
            }
        }
        delivered
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
