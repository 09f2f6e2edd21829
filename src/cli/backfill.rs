//! Backfill command implementation

use crate::config::Config;
use crate::history::{HistoricalJob, HistoryRange, SymbolReport, YahooChartClient};
use chrono::{NaiveDate, Utc};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct BackfillArgs {
    /// Symbols to fetch (comma separated); defaults to the configured set
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Named period such as 1d, 6mo or 1y (ignored when dates are given)
    #[arg(short, long)]
    pub period: Option<String>,

    /// First day to fetch (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Day after the last one to fetch (YYYY-MM-DD); defaults to today
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,
}

impl BackfillArgs {
    pub fn range(&self, default_period: &str) -> anyhow::Result<HistoryRange> {
        match self.start {
            Some(start) => {
                let end = self.end.unwrap_or_else(|| Utc::now().date_naive());
                if start >= end {
                    anyhow::bail!("--start {} must be before --end {}", start, end);
                }
                Ok(HistoryRange::Dates { start, end })
            }
            None => Ok(HistoryRange::Period(
                self.period
                    .clone()
                    .unwrap_or_else(|| default_period.to_string()),
            )),
        }
    }

    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let symbols = if self.symbols.is_empty() {
            config.feed.symbols.clone()
        } else {
            self.symbols.clone()
        };
        let range = self.range(&config.history.period)?;

        let store = super::build_store(&config.storage);
        let source = Arc::new(YahooChartClient::new(config.history.yahoo_config())?);
        let report = HistoricalJob::new(source, store)
            .run_once(&symbols, &range)
            .await;

        println!("Backfill {:?}:", range);
        for (symbol, outcome) in &report.results {
            match outcome {
                SymbolReport::Success { records } => println!("  {}: {} records", symbol, records),
                SymbolReport::NoData => println!("  {}: no data", symbol),
                SymbolReport::Error(e) => println!("  {}: error: {}", symbol, e),
            }
        }
        println!(
            "  Total: {} records, {} failures",
            report.records_inserted(),
            report.failures()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(start: Option<&str>, end: Option<&str>, period: Option<&str>) -> BackfillArgs {
        BackfillArgs {
            symbols: vec![],
            period: period.map(String::from),
            start: start.map(|s| s.parse().unwrap()),
            end: end.map(|s| s.parse().unwrap()),
        }
    }

    #[test]
    fn test_range_defaults_to_config_period() {
        let range = args(None, None, None).range("1d").unwrap();
        assert_eq!(range, HistoryRange::Period("1d".to_string()));

        let range = args(None, None, Some("1y")).range("1d").unwrap();
        assert_eq!(range, HistoryRange::Period("1y".to_string()));
    }

    #[test]
    fn test_dates_override_period() {
        let range = args(Some("2024-01-01"), Some("2024-03-01"), Some("1y"))
            .range("1d")
            .unwrap();
        assert!(matches!(range, HistoryRange::Dates { start, .. } if start.to_string() == "2024-01-01"));
    }

    #[test]
    fn test_inverted_dates_rejected() {
        assert!(args(Some("2024-03-01"), Some("2024-01-01"), None)
            .range("1d")
            .is_err());
    }
}
