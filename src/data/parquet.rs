//! Parquet-backed storage

use super::{PriceStore, StorageError};
use crate::feed::Tick;
use crate::history::Ohlcv;
use arrow::array::{
    Array, ArrayRef, Date32Array, StringArray, TimestampMillisecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Price tick schema fields
pub fn price_tick_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        ),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("price", DataType::Utf8, false), // Store as string for Decimal precision
        Field::new("volume", DataType::UInt64, false),
        Field::new("change_percent", DataType::Utf8, false),
    ])
}

/// Daily bar schema fields
pub fn historical_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("open", DataType::Utf8, false),
        Field::new("high", DataType::Utf8, false),
        Field::new("low", DataType::Utf8, false),
        Field::new("close", DataType::Utf8, false),
        Field::new("volume", DataType::UInt64, false),
    ])
}

/// Writes every batch to its own Snappy-compressed Parquet file
pub struct ParquetStore {
    output_dir: PathBuf,
    sequence: AtomicU64,
}

impl ParquetStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File path for a batch; the sequence number keeps same-second
    /// flushes from overwriting each other
    pub fn file_path(&self, prefix: &str, timestamp: DateTime<Utc>, seq: u64) -> PathBuf {
        let filename = format!(
            "{}_{}_{:06}.parquet",
            prefix,
            timestamp.format("%Y%m%d_%H%M%S"),
            seq
        );
        self.output_dir.join(filename)
    }

    fn next_path(&self, prefix: &str) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.file_path(prefix, Utc::now(), seq)
    }
}

#[async_trait]
impl PriceStore for ParquetStore {
    async fn insert_price_batch(&self, records: &[Tick]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.next_path("price_ticks");
        let records = records.to_vec();
        let count = records.len();

        let written = path.clone();
        tokio::task::spawn_blocking(move || write_price_ticks(&written, &records))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        tracing::info!(count, path = ?path, "Inserted price records");
        Ok(())
    }

    async fn insert_historical_batch(&self, records: &[Ohlcv]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.next_path("historical");
        let records = records.to_vec();
        let count = records.len();

        let written = path.clone();
        tokio::task::spawn_blocking(move || write_historical(&written, &records))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        tracing::info!(count, path = ?path, "Inserted historical records");
        Ok(())
    }
}

fn writer_for(path: &Path, schema: Arc<Schema>) -> Result<ArrowWriter<File>, StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    Ok(ArrowWriter::try_new(file, schema, Some(props))?)
}

/// Write price ticks to a Parquet file
pub fn write_price_ticks(path: &Path, ticks: &[Tick]) -> Result<(), StorageError> {
    let schema = Arc::new(price_tick_schema());
    let mut writer = writer_for(path, schema.clone())?;

    let timestamps: Vec<i64> = ticks.iter().map(|t| t.timestamp_ms).collect();
    let symbols: Vec<&str> = ticks.iter().map(|t| t.symbol.as_str()).collect();
    let prices: Vec<String> = ticks.iter().map(|t| t.price.to_string()).collect();
    let volumes: Vec<u64> = ticks.iter().map(|t| t.volume).collect();
    let changes: Vec<String> = ticks.iter().map(|t| t.change_percent.to_string()).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampMillisecondArray::from(timestamps).with_timezone("UTC")) as ArrayRef,
            Arc::new(StringArray::from(symbols)) as ArrayRef,
            Arc::new(StringArray::from_iter_values(prices.iter())) as ArrayRef,
            Arc::new(UInt64Array::from(volumes)) as ArrayRef,
            Arc::new(StringArray::from_iter_values(changes.iter())) as ArrayRef,
        ],
    )?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = ticks.len(), "Wrote price ticks to Parquet");

    Ok(())
}

/// Write daily bars to a Parquet file
pub fn write_historical(path: &Path, bars: &[Ohlcv]) -> Result<(), StorageError> {
    let schema = Arc::new(historical_schema());
    let mut writer = writer_for(path, schema.clone())?;

    let dates: Vec<i32> = bars
        .iter()
        .map(|b| b.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    let symbols: Vec<&str> = bars.iter().map(|b| b.symbol.as_str()).collect();
    let decimal_column = |f: fn(&Ohlcv) -> Decimal| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(
            bars.iter().map(|b| f(b).to_string()),
        ))
    };
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Date32Array::from(dates)) as ArrayRef,
            Arc::new(StringArray::from(symbols)) as ArrayRef,
            decimal_column(|b| b.open),
            decimal_column(|b| b.high),
            decimal_column(|b| b.low),
            decimal_column(|b| b.close),
            Arc::new(UInt64Array::from(volumes)) as ArrayRef,
        ],
    )?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = bars.len(), "Wrote historical bars to Parquet");

    Ok(())
}

/// Reader for Parquet files written by [`ParquetStore`]
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read price ticks from a Parquet file
    pub fn read_price_ticks(&self) -> anyhow::Result<Vec<Tick>> {
        let mut ticks = Vec::new();

        for batch in self.batches()? {
            let timestamps = column::<TimestampMillisecondArray>(&batch, 0, "timestamp")?;
            let symbols = column::<StringArray>(&batch, 1, "symbol")?;
            let prices = column::<StringArray>(&batch, 2, "price")?;
            let volumes = column::<UInt64Array>(&batch, 3, "volume")?;
            let changes = column::<StringArray>(&batch, 4, "change_percent")?;

            for i in 0..batch.num_rows() {
                ticks.push(Tick {
                    symbol: symbols.value(i).to_string(),
                    price: Decimal::from_str(prices.value(i))?,
                    volume: volumes.value(i),
                    change_percent: Decimal::from_str(changes.value(i))?,
                    timestamp_ms: timestamps.value(i),
                });
            }
        }

        Ok(ticks)
    }

    /// Read daily bars from a Parquet file
    pub fn read_historical(&self) -> anyhow::Result<Vec<Ohlcv>> {
        let mut bars = Vec::new();

        for batch in self.batches()? {
            let dates = column::<Date32Array>(&batch, 0, "date")?;
            let symbols = column::<StringArray>(&batch, 1, "symbol")?;
            let opens = column::<StringArray>(&batch, 2, "open")?;
            let highs = column::<StringArray>(&batch, 3, "high")?;
            let lows = column::<StringArray>(&batch, 4, "low")?;
            let closes = column::<StringArray>(&batch, 5, "close")?;
            let volumes = column::<UInt64Array>(&batch, 6, "volume")?;

            for i in 0..batch.num_rows() {
                let date =
                    NaiveDate::from_num_days_from_ce_opt(dates.value(i) + UNIX_EPOCH_DAYS_FROM_CE)
                        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;
                bars.push(Ohlcv {
                    symbol: symbols.value(i).to_string(),
                    date,
                    open: Decimal::from_str(opens.value(i))?,
                    high: Decimal::from_str(highs.value(i))?,
                    low: Decimal::from_str(lows.value(i))?,
                    close: Decimal::from_str(closes.value(i))?,
                    volume: volumes.value(i),
                });
            }
        }

        Ok(bars)
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn batches(&self) -> anyhow::Result<Vec<RecordBatch>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        Ok(reader.collect::<Result<Vec<_>, _>>()?)
    }
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    index: usize,
    name: &str,
) -> anyhow::Result<&'a T> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
}
