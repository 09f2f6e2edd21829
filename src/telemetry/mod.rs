//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod counters;
mod logging;

pub use counters::{
    increment, increment_by, init_metrics, record_alert, set_gauge, CounterMetric, GaugeMetric,
};
pub use logging::{init_logging, LogFormat};

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, config.log_format)?;

    if let Some(port) = config.metrics_port {
        init_metrics(port)?;
    }

    Ok(())
}
