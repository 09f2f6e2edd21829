//! In-memory storage for dry runs and tests

use super::{PriceStore, StorageError};
use crate::feed::Tick;
use crate::history::Ohlcv;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Keeps every inserted batch in memory
#[derive(Default)]
pub struct MemoryStore {
    price_batches: RwLock<Vec<Vec<Tick>>>,
    historical: RwLock<Vec<Ohlcv>>,
    failures_remaining: AtomicU32,
    price_attempts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` price inserts fail
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Successfully inserted price batches, in insertion order
    pub async fn price_batches(&self) -> Vec<Vec<Tick>> {
        self.price_batches.read().await.clone()
    }

    /// All persisted ticks flattened
    pub async fn price_records(&self) -> Vec<Tick> {
        self.price_batches.read().await.concat()
    }

    pub async fn historical(&self) -> Vec<Ohlcv> {
        self.historical.read().await.clone()
    }

    /// Price insert calls, including failed ones
    pub fn price_attempts(&self) -> u64 {
        self.price_attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn insert_price_batch(&self, records: &[Tick]) -> Result<(), StorageError> {
        self.price_attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        self.price_batches.write().await.push(records.to_vec());
        Ok(())
    }

    async fn insert_historical_batch(&self, records: &[Ohlcv]) -> Result<(), StorageError> {
        self.historical.write().await.extend_from_slice(records);
        Ok(())
    }
}
