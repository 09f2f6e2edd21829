//! Storage collaborator
//!
//! The pipeline only writes: batches of ticks from the processor and
//! daily bars from the historical job. Parquet is the durable backend;
//! the in-memory store backs dry runs and tests.

mod memory;
mod parquet;

pub use memory::MemoryStore;
pub use self::parquet::{historical_schema, price_tick_schema, ParquetReader, ParquetStore};

use crate::feed::Tick;
use crate::history::Ohlcv;
use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Write task failed: {0}")]
    Task(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Write side of the storage engine
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Persist a batch of ticks. Idempotency is not assumed.
    async fn insert_price_batch(&self, records: &[Tick]) -> Result<(), StorageError>;

    /// Persist daily bars
    async fn insert_historical_batch(&self, records: &[Ohlcv]) -> Result<(), StorageError>;
}
