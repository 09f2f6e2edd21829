//! Historical data types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One daily open/high/low/close/volume bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Window to fetch: a named period ("1d", "6mo", "1y") or explicit dates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRange {
    Period(String),
    /// Inclusive start, exclusive end (upstream semantics)
    Dates { start: NaiveDate, end: NaiveDate },
}

impl Default for HistoryRange {
    fn default() -> Self {
        HistoryRange::Period("1d".to_string())
    }
}

/// Outcome of fetching one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolReport {
    Success { records: usize },
    NoData,
    Error(String),
}

/// Outcome of a whole historical run
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    pub results: Vec<(String, SymbolReport)>,
}

impl JobReport {
    pub fn records_inserted(&self) -> usize {
        self.results
            .iter()
            .map(|(_, r)| match r {
                SymbolReport::Success { records } => *records,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, SymbolReport::Error(_)))
            .count()
    }
}
