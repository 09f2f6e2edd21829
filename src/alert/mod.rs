//! Alert engine module
//!
//! Threshold evaluation of ticks plus typed listener dispatch

mod engine;
mod listeners;
mod types;

pub use engine::{AlertEngine, DEFAULT_THRESHOLD};
pub use listeners::{FanoutAlertListener, LogAlertListener, MetricsAlertListener};
pub use types::{Alert, AlertKind};

use async_trait::async_trait;

/// Receives alerts raised by the engine
#[async_trait]
pub trait AlertListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;
    /// Handle one alert. An error is logged by the engine and does not
    /// affect other listeners.
    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()>;
}
