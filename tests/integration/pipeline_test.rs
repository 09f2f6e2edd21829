//! Queue -> processor -> storage, with alerts fanned out to subscribers

use breadboard::alert::{AlertEngine, FanoutAlertListener, LogAlertListener};
use breadboard::data::{MemoryStore, ParquetReader, ParquetStore};
use breadboard::fanout::FanoutHub;
use breadboard::feed::Tick;
use breadboard::pipeline::{ingestion_queue, BatchConfig, BatchProcessor, Offer, QueueSender, Take};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Wait until the processor has taken everything offered
async fn drained(queue: &QueueSender) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

fn tick(symbol: &str, change_percent: Decimal, ts: i64) -> Tick {
    Tick {
        symbol: symbol.to_string(),
        price: dec!(187.42),
        volume: 1_000,
        change_percent,
        timestamp_ms: ts,
    }
}

#[tokio::test]
async fn test_ticks_persisted_and_alerts_fanned_out() {
    let (queue, rx) = ingestion_queue(128);
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(FanoutHub::new(16));
    let mut sub = hub.connect().await;

    let alerts = Arc::new(AlertEngine::new(dec!(-5.0)));
    assert!(alerts.register(Arc::new(LogAlertListener)).await);
    assert!(alerts.register(Arc::new(FanoutAlertListener::new(hub.clone()))).await);

    let processor = BatchProcessor::new(
        rx,
        store.clone(),
        alerts,
        BatchConfig {
            max_batch_size: 3,
            batch_timeout: Duration::from_secs(30),
            ..Default::default()
        },
    )
    .spawn();

    let ticks: Vec<Tick> = [dec!(-1.0), dec!(-6.2), dec!(0.4), dec!(-5.0), dec!(2.0)]
        .into_iter()
        .enumerate()
        .map(|(i, change)| tick("AAPL", change, 1_700_000_000_000 + i as i64))
        .collect();
    for t in &ticks {
        assert_eq!(queue.offer(t.clone()), Offer::Accepted);
    }

    let mut alert_messages = Vec::new();
    for _ in 0..2 {
        let payload = tokio::time::timeout(Duration::from_secs(5), sub.rx.recv())
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["type"], "alert");
        alert_messages.push(json["data"]["message"].as_str().unwrap().to_string());
    }
    assert_eq!(
        alert_messages,
        vec!["Alert: AAPL dropped -6.20%", "Alert: AAPL dropped -5.00%"]
    );

    drained(&queue).await;
    let stats = processor.stop().await.unwrap();
    assert_eq!(stats.ticks_processed, 5);
    assert_eq!(stats.alerts_raised, 2);
    assert_eq!(stats.flushes, 2);

    let batches = store.price_batches().await;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 3);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(store.price_records().await, ticks);
}

#[tokio::test]
async fn test_overload_drops_newest() {
    let (queue, mut rx) = ingestion_queue(2);

    assert_eq!(queue.offer(tick("A", dec!(0), 1)), Offer::Accepted);
    assert_eq!(queue.offer(tick("B", dec!(0), 2)), Offer::Accepted);
    assert_eq!(queue.offer(tick("C", dec!(0), 3)), Offer::Dropped);
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.dropped(), 1);

    let mut symbols = Vec::new();
    while let Take::Tick(t) = rx.take(Duration::from_millis(10)).await {
        symbols.push(t.symbol);
    }
    assert_eq!(symbols, vec!["A", "B"]);
}

#[tokio::test]
async fn test_parquet_batches_round_trip() {
    let dir = TempDir::new().unwrap();
    let (queue, rx) = ingestion_queue(16);
    let store = Arc::new(ParquetStore::new(dir.path()));

    let processor = BatchProcessor::new(
        rx,
        store,
        Arc::new(AlertEngine::default()),
        BatchConfig {
            max_batch_size: 2,
            batch_timeout: Duration::from_secs(30),
            ..Default::default()
        },
    )
    .spawn();

    let ticks: Vec<Tick> = (0..5)
        .map(|i| tick("NVDA", dec!(0.5), 1_700_000_000_000 + i))
        .collect();
    for t in &ticks {
        queue.offer(t.clone());
    }
    drained(&queue).await;
    let stats = processor.stop().await.unwrap();
    assert_eq!(stats.records_written, 5);

    let mut files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    assert_eq!(files.len(), 3);

    let mut read_back = Vec::new();
    for path in files {
        read_back.extend(ParquetReader::new(path).read_price_ticks().unwrap());
    }
    assert_eq!(read_back, ticks);
}
