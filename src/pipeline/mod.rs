//! Ingestion pipeline
//!
//! Bounded queue between the feed and the batch processor, and the
//! processor that persists ticks and evaluates alerts.

mod processor;
mod queue;

pub use processor::{BatchConfig, BatchProcessor, FlushOutcome, ProcessorHandle, ProcessorStats};
pub use queue::{
    ingestion_queue, Offer, QueueReceiver, QueueSender, Take, DEFAULT_QUEUE_CAPACITY,
};

use thiserror::Error;

/// Errors that interrupt a processor iteration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Ingestion queue closed")]
    QueueClosed,
}
