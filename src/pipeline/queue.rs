//! Bounded ingestion queue between the feed client and the batch processor
//!
//! Producers never block: when the queue is full the newest tick is dropped
//! and counted. The single consumer waits with a timeout so it can keep its
//! time-based flush cadence while the feed is quiet.

use crate::feed::Tick;
use crate::telemetry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Result of offering a tick to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// Queue was full; the tick was dropped
    Dropped,
    /// Consumer is gone
    Closed,
}

/// Result of waiting for a tick
#[derive(Debug, Clone, PartialEq)]
pub enum Take {
    Tick(Tick),
    TimedOut,
    Closed,
}

/// Create a queue with the given capacity
pub fn ingestion_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        QueueSender {
            tx,
            dropped: dropped.clone(),
        },
        QueueReceiver { rx, dropped },
    )
}

/// Producer side; cheap to clone
/// Drops between warnings while the queue stays full
const DROP_LOG_EVERY: u64 = 1_000;

/// Warn on the first drop and then once per `DROP_LOG_EVERY`
fn should_log_drop(total: u64) -> bool {
    total == 1 || total % DROP_LOG_EVERY == 0
}

#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<Tick>,
    dropped: Arc<AtomicU64>,
}

impl QueueSender {
    /// Non-blocking enqueue; drops the tick when the queue is full
    pub fn offer(&self, tick: Tick) -> Offer {
        match self.tx.try_send(tick) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(tick)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                telemetry::increment(telemetry::CounterMetric::QueueDropped);
                if should_log_drop(total) {
                    tracing::warn!(
                        symbol = %tick.symbol,
                        dropped_total = total,
                        "Ingestion queue full, dropping tick"
                    );
                }
                Offer::Dropped
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Ticks currently waiting
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Total ticks dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<Tick>,
    dropped: Arc<AtomicU64>,
}

impl QueueReceiver {
    /// Wait up to `timeout` for the next tick
    pub async fn take(&mut self, timeout: Duration) -> Take {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(tick)) => Take::Tick(tick),
            Ok(None) => Take::Closed,
            Err(_) => Take::TimedOut,
        }
    }

    /// Ticks currently waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
