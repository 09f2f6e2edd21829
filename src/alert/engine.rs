//! Threshold evaluation and listener dispatch

use super::types::two_places;
use super::{Alert, AlertKind, AlertListener};
use crate::feed::Tick;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default alert threshold: a 5% drop
pub const DEFAULT_THRESHOLD: Decimal = dec!(-5.0);

/// Evaluates ticks against a drop threshold and notifies listeners
pub struct AlertEngine {
    threshold: Decimal,
    listeners: RwLock<Vec<Arc<dyn AlertListener>>>,
}

impl AlertEngine {
    /// Create an engine that fires when `change_percent <= threshold`
    pub fn new(threshold: Decimal) -> Self {
        Self {
            threshold,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Inclusive: a change exactly at the threshold fires
    pub fn check_condition(&self, change_percent: Decimal) -> bool {
        change_percent <= self.threshold
    }

    /// Build the alert for a tick; does not check the condition
    pub fn create_alert(&self, tick: &Tick) -> Alert {
        Alert {
            kind: AlertKind::PriceDrop,
            symbol: tick.symbol.clone(),
            price: tick.price,
            change_percent: tick.change_percent,
            timestamp_ms: tick.timestamp_ms,
            message: format!(
                "Alert: {} dropped {:.2}%",
                tick.symbol,
                two_places(tick.change_percent)
            ),
        }
    }

    /// Alert for `tick` if it crosses the threshold
    pub fn evaluate(&self, tick: &Tick) -> Option<Alert> {
        self.check_condition(tick.change_percent)
            .then(|| self.create_alert(tick))
    }

    /// Register a listener. Returns false if the same listener is already
    /// registered.
    pub async fn register(&self, listener: Arc<dyn AlertListener>) -> bool {
        let mut listeners = self.listeners.write().await;
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        tracing::debug!(listener = listener.name(), "Registered alert listener");
        listeners.push(listener);
        true
    }

    /// Remove a listener. Returns false if it was not registered.
    pub async fn deregister(&self, listener: &Arc<dyn AlertListener>) -> bool {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Deliver an alert to every listener. A failing listener is logged and
    /// skipped; returns how many listeners succeeded.
    pub async fn dispatch(&self, alert: &Alert) -> usize {
        let snapshot: Vec<Arc<dyn AlertListener>> = self.listeners.read().await.clone();

        let mut delivered = 0;
        for listener in snapshot {
            match listener.on_alert(alert).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::error!(
                        listener = listener.name(),
                        symbol = %alert.symbol,
                        error = %e,
                        "Alert listener failed"
                    );
                }
            }
        }
        delivered
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

fn same_listener(a: &Arc<dyn AlertListener>, b: &Arc<dyn AlertListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
