//! Configuration types for breadboard

use crate::alert::DEFAULT_THRESHOLD;
use crate::feed::{BackoffPolicy, FeedClientConfig};
use crate::history::{HistoryRange, YahooConfig, DEFAULT_INTERVAL_HOURS, YAHOO_CHART_URL};
use crate::pipeline::{BatchConfig, DEFAULT_QUEUE_CAPACITY};
use crate::telemetry::LogFormat;
use crate::ws::{WsConfig, DEFAULT_ORIGIN, DEFAULT_STREAM_URL};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Symbols tracked when the config names none
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "AAPL", "BTC-USD", "NVDA", "TSLA", "META", "AMZN", "GOOGL", "MSFT", "SPY", "QQQ", "ETH-USD",
    "SOL-USD", "AMD", "NFLX", "COIN",
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub pipeline: PipelineConfig,
    pub alerts: AlertsConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub history: HistoryConfig,
    pub telemetry: TelemetryConfig,
}

/// Upstream feed configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// `Origin` header sent on the handshake; empty to omit
    pub origin: String,
    pub symbols: Vec<String>,
    pub reconnect_delay_secs: f64,
    pub backoff: BackoffPolicy,
    /// Cap for exponential backoff
    pub max_reconnect_delay_secs: f64,
    pub ping_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            reconnect_delay_secs: 5.0,
            backoff: BackoffPolicy::Fixed,
            max_reconnect_delay_secs: 60.0,
            ping_interval_secs: 30,
        }
    }
}

impl FeedConfig {
    pub fn ws_config(&self) -> WsConfig {
        let origin = (!self.origin.is_empty()).then(|| self.origin.clone());
        WsConfig::new(&self.url)
            .origin(origin)
            .ping_interval(Duration::from_secs(self.ping_interval_secs))
    }

    pub fn client_config(&self) -> FeedClientConfig {
        FeedClientConfig::new(self.symbols.clone())
            .reconnect_delay(secs(self.reconnect_delay_secs))
            .max_reconnect_delay(secs(self.max_reconnect_delay_secs))
            .backoff(self.backoff)
    }
}

/// Queue and batching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub max_batch_size: usize,
    pub batch_timeout_secs: f64,
    pub error_backoff_secs: f64,
    /// Extra write attempts before a failed batch is discarded
    pub flush_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_batch_size: 100,
            batch_timeout_secs: 1.0,
            error_backoff_secs: 1.0,
            flush_retries: 0,
            retry_delay_ms: 200,
        }
    }
}

impl PipelineConfig {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_batch_size: self.max_batch_size,
            batch_timeout: secs(self.batch_timeout_secs),
            error_backoff: secs(self.error_backoff_secs),
            flush_retries: self.flush_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Alert configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Percentage change at or below which an alert fires
    pub threshold: Decimal,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Parquet,
    /// Keep batches in memory only (dry runs)
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Parquet,
            output_dir: PathBuf::from("./data"),
        }
    }
}

/// Fan-out server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind_addr: String,
    /// Per-subscriber buffered events
    pub subscriber_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0:8000".to_string(),
            subscriber_buffer: 256,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.bind_addr {}: {}", self.bind_addr, e)))
    }
}

/// Historical job configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub period: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            period: "1d".to_string(),
            base_url: YAHOO_CHART_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl HistoryConfig {
    pub fn range(&self) -> HistoryRange {
        HistoryRange::Period(self.period.clone())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    pub fn yahoo_config(&self) -> YahooConfig {
        YahooConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..Default::default()
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus listener port; metrics are not exported when unset
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.feed.symbols.is_empty() {
            return invalid("feed.symbols must not be empty");
        }
        if !positive(self.feed.reconnect_delay_secs) {
            return invalid("feed.reconnect_delay_secs must be positive");
        }
        if !positive(self.feed.max_reconnect_delay_secs)
            || self.feed.max_reconnect_delay_secs < self.feed.reconnect_delay_secs
        {
            return invalid("feed.max_reconnect_delay_secs must be >= feed.reconnect_delay_secs");
        }
        if self.feed.ping_interval_secs == 0 {
            return invalid("feed.ping_interval_secs must be positive");
        }
        if self.pipeline.queue_capacity == 0 {
            return invalid("pipeline.queue_capacity must be positive");
        }
        if self.pipeline.max_batch_size == 0 {
            return invalid("pipeline.max_batch_size must be positive");
        }
        if !positive(self.pipeline.batch_timeout_secs) {
            return invalid("pipeline.batch_timeout_secs must be positive");
        }
        if !positive(self.pipeline.error_backoff_secs) {
            return invalid("pipeline.error_backoff_secs must be positive");
        }
        if self.server.subscriber_buffer == 0 {
            return invalid("server.subscriber_buffer must be positive");
        }
        if self.history.interval_hours == 0 {
            return invalid("history.interval_hours must be positive");
        }
        if self.server.enabled {
            self.server.socket_addr()?;
        }
        Ok(())
    }
}

fn positive(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
