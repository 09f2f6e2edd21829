//! Scheduled historical fetch

use super::{HistoricalSource, HistoryRange, JobReport, SymbolReport};
use crate::data::PriceStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Hours between scheduled runs
pub const DEFAULT_INTERVAL_HOURS: u64 = 6;

/// Fetches bars per symbol and stores them
pub struct HistoricalJob {
    source: Arc<dyn HistoricalSource>,
    store: Arc<dyn PriceStore>,
}

impl HistoricalJob {
    pub fn new(source: Arc<dyn HistoricalSource>, store: Arc<dyn PriceStore>) -> Self {
        Self { source, store }
    }

    /// Fetch and store every symbol. One symbol failing does not stop the
    /// rest.
    pub async fn run_once(&self, symbols: &[String], range: &HistoryRange) -> JobReport {
        tracing::info!(symbols = symbols.len(), ?range, "Starting historical fetch");
        let mut report = JobReport::default();

        for symbol in symbols {
            let outcome = self.fetch_symbol(symbol, range).await;
            match &outcome {
                SymbolReport::Success { records } => {
                    tracing::info!(symbol = %symbol, records, "Inserted historical bars")
                }
                SymbolReport::NoData => tracing::warn!(symbol = %symbol, "No historical data"),
                SymbolReport::Error(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "Historical fetch failed")
                }
            }
            report.results.push((symbol.clone(), outcome));
        }

        tracing::info!(
            records = report.records_inserted(),
            failures = report.failures(),
            "Historical fetch completed"
        );
        report
    }

    async fn fetch_symbol(&self, symbol: &str, range: &HistoryRange) -> SymbolReport {
        let bars = match self.source.fetch(symbol, range).await {
            Ok(bars) if bars.is_empty() => return SymbolReport::NoData,
            Ok(bars) => bars,
            Err(e) => return SymbolReport::Error(e.to_string()),
        };
        match self.store.insert_historical_batch(&bars).await {
            Ok(()) => SymbolReport::Success {
                records: bars.len(),
            },
            Err(e) => SymbolReport::Error(e.to_string()),
        }
    }

    /// Run once immediately, then every `every`, until shutdown
    pub fn spawn_schedule(
        self: Arc<Self>,
        symbols: Vec<String>,
        range: HistoryRange,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        self.run_once(&symbols, &range).await;
                    }
                }
            }
            tracing::info!("Historical schedule stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use crate::history::{HistoryError, Ohlcv};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistoricalSource for StubSource {
        async fn fetch(
            &self,
            symbol: &str,
            _range: &HistoryRange,
        ) -> Result<Vec<Ohlcv>, HistoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "EMPTY" => Ok(Vec::new()),
                "BROKEN" => Err(HistoryError::Parse("bad body".to_string())),
                _ => Ok(vec![Ohlcv {
                    symbol: symbol.to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                    open: dec!(10),
                    high: dec!(12),
                    low: dec!(9),
                    close: dec!(11),
                    volume: 1_000,
                }]),
            }
        }
    }

    fn job() -> (Arc<HistoricalJob>, Arc<StubSource>, Arc<MemoryStore>) {
        let source = Arc::new(StubSource {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let job = Arc::new(HistoricalJob::new(source.clone(), store.clone()));
        (job, source, store)
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_once_reports_each_symbol() {
        let (job, _, store) = job();
        let report = job
            .run_once(
                &symbols(&["AAPL", "BROKEN", "EMPTY", "MSFT"]),
                &HistoryRange::default(),
            )
            .await;

        assert_eq!(report.results.len(), 4);
        assert_eq!(report.results[0].1, SymbolReport::Success { records: 1 });
        assert!(matches!(report.results[1].1, SymbolReport::Error(_)));
        assert_eq!(report.results[2].1, SymbolReport::NoData);
        assert_eq!(report.records_inserted(), 2);
        assert_eq!(report.failures(), 1);
        assert_eq!(store.historical().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_runs_at_start_and_every_interval() {
        let (job, source, _) = job();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let every = Duration::from_secs(DEFAULT_INTERVAL_HOURS * 3600);

        let handle = job.spawn_schedule(
            symbols(&["AAPL", "MSFT"]),
            HistoryRange::default(),
            every,
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(every).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
