//! Built-in alert listeners

use super::types::two_places;
use super::{Alert, AlertListener};
use crate::fanout::{FanoutHub, FeedEvent};
use crate::telemetry;
use async_trait::async_trait;
use std::sync::Arc;

/// Logs every alert at warn level
#[derive(Debug, Default)]
pub struct LogAlertListener;

#[async_trait]
impl AlertListener for LogAlertListener {
    fn name(&self) -> &str {
        "log"
    }

    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        tracing::warn!(
            symbol = %alert.symbol,
            change_percent = %alert.change_percent,
            price = %alert.price,
            "ALERT: {} dropped {:.2}% to ${:.2}",
            alert.symbol,
            two_places(alert.change_percent),
            two_places(alert.price)
        );
        Ok(())
    }
}

/// Counts alerts per symbol
#[derive(Debug, Default)]
pub struct MetricsAlertListener;

#[async_trait]
impl AlertListener for MetricsAlertListener {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        telemetry::record_alert(&alert.symbol);
        Ok(())
    }
}

/// Pushes alerts to live subscribers
pub struct FanoutAlertListener {
    hub: Arc<FanoutHub>,
}

impl FanoutAlertListener {
    pub fn new(hub: Arc<FanoutHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl AlertListener for FanoutAlertListener {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        let delivered = self.hub.broadcast(&FeedEvent::Alert(alert.clone())).await;
        tracing::debug!(symbol = %alert.symbol, delivered, "Alert fanned out");
        Ok(())
    }
}
