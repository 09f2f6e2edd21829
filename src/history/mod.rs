//! Historical bulk job
//!
//! Fetches daily OHLCV bars for the tracked symbols and hands them to the
//! storage collaborator, once at start and then on a fixed schedule.

mod job;
mod types;
mod yahoo;

pub use job::{HistoricalJob, DEFAULT_INTERVAL_HOURS};
pub use types::{HistoryRange, JobReport, Ohlcv, SymbolReport};
pub use yahoo::{YahooChartClient, YahooConfig, YAHOO_CHART_URL};

use crate::data::StorageError;
use async_trait::async_trait;
use thiserror::Error;

/// Historical fetch errors
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream error for {symbol}: {message}")]
    Api { symbol: String, message: String },
    #[error("Malformed response: {0}")]
    Parse(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Source of daily bars
#[async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Fetch bars for one symbol. An empty vector means the upstream had no
    /// rows for the window, which is not an error.
    async fn fetch(&self, symbol: &str, range: &HistoryRange) -> Result<Vec<Ohlcv>, HistoryError>;
}
