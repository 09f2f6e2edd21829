//! Prometheus metrics

use std::net::SocketAddr;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Frames received from the upstream feed
    FramesReceived,
    /// Frames that failed to decode
    DecodeErrors,
    /// Ticks dropped because the ingestion queue was full
    QueueDropped,
    /// Feed reconnect attempts
    Reconnects,
    /// Batches handed to storage
    Flushes,
    /// Flush attempts that failed
    FlushFailures,
    /// Records persisted
    RecordsWritten,
    /// Records discarded after a failed flush
    RecordsDiscarded,
    /// Alerts raised
    Alerts,
    /// Fan-out deliveries that failed for a subscriber
    FanoutFailures,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::FramesReceived => "breadboard_feed_frames_total",
            CounterMetric::DecodeErrors => "breadboard_feed_decode_errors_total",
            CounterMetric::QueueDropped => "breadboard_queue_dropped_total",
            CounterMetric::Reconnects => "breadboard_feed_reconnects_total",
            CounterMetric::Flushes => "breadboard_batch_flushes_total",
            CounterMetric::FlushFailures => "breadboard_batch_flush_failures_total",
            CounterMetric::RecordsWritten => "breadboard_records_written_total",
            CounterMetric::RecordsDiscarded => "breadboard_records_discarded_total",
            CounterMetric::Alerts => "breadboard_alerts_total",
            CounterMetric::FanoutFailures => "breadboard_fanout_failures_total",
        }
    }
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Connected live subscribers
    Subscribers,
    /// Ticks pending in the current batch
    PendingBatch,
}

impl GaugeMetric {
    pub fn name(self) -> &'static str {
        match self {
            GaugeMetric::Subscribers => "breadboard_fanout_subscribers",
            GaugeMetric::PendingBatch => "breadboard_batch_pending",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    increment_by(metric, 1);
}

/// Increment a counter by `value`
pub fn increment_by(metric: CounterMetric, value: u64) {
    metrics::counter!(metric.name()).increment(value);
}

/// Count an alert for a symbol
pub fn record_alert(symbol: &str) {
    metrics::counter!(CounterMetric::Alerts.name(), "symbol" => symbol.to_string()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Install the Prometheus exporter with an HTTP scrape listener
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus metrics listener started");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for metric in [
            CounterMetric::FramesReceived,
            CounterMetric::QueueDropped,
            CounterMetric::RecordsDiscarded,
            CounterMetric::FanoutFailures,
        ] {
            assert!(metric.name().starts_with("breadboard_"));
            assert!(metric.name().ends_with("_total"));
        }
        assert_eq!(GaugeMetric::Subscribers.name(), "breadboard_fanout_subscribers");
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        increment(CounterMetric::Flushes);
        record_alert("AAPL");
        set_gauge(GaugeMetric::PendingBatch, 3.0);
    }
}
