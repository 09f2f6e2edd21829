//! Batch processor
//!
//! Drains the ingestion queue, evaluates alerts in-line and writes ticks to
//! storage in batches. A batch is flushed when it reaches `max_batch_size`
//! or when `batch_timeout` has passed since the previous flush, whichever
//! comes first; both are checked on every iteration so a quiet feed still
//! flushes on cadence.

use super::{PipelineError, QueueReceiver, Take};
use crate::alert::AlertEngine;
use crate::data::PriceStore;
use crate::feed::Tick;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

/// Batching configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Flush as soon as the batch holds this many ticks
    pub max_batch_size: usize,
    /// Flush at least this often
    pub batch_timeout: Duration,
    /// Pause after a loop error before resuming
    pub error_backoff: Duration,
    /// Extra write attempts before a failed batch is discarded
    pub flush_retries: u32,
    /// Pause between write attempts
    pub retry_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            batch_timeout: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
            flush_retries: 0,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Running totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub ticks_processed: u64,
    pub alerts_raised: u64,
    /// Batches written successfully
    pub flushes: u64,
    /// Individual write attempts that failed
    pub failed_flushes: u64,
    pub records_written: u64,
    /// Records lost because every write attempt failed
    pub records_discarded: u64,
}

/// What a flush did with the pending batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Written(usize),
    Discarded(usize),
}

/// Single-consumer batching loop
pub struct BatchProcessor {
    queue: QueueReceiver,
    store: Arc<dyn PriceStore>,
    alerts: Arc<AlertEngine>,
    config: BatchConfig,
    batch: Vec<Tick>,
    last_flush: Instant,
    stats: ProcessorStats,
}

impl BatchProcessor {
    pub fn new(
        queue: QueueReceiver,
        store: Arc<dyn PriceStore>,
        alerts: Arc<AlertEngine>,
        config: BatchConfig,
    ) -> Self {
        let batch = Vec::with_capacity(config.max_batch_size);
        Self {
            queue,
            store,
            alerts,
            config,
            batch,
            last_flush: Instant::now(),
            stats: ProcessorStats::default(),
        }
    }

    /// Ticks waiting for the next flush
    pub fn pending(&self) -> &[Tick] {
        &self.batch
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// One loop iteration: wait for a tick (bounded by the time left until
    /// the next time-based flush), then check both flush triggers
    pub async fn step(&mut self) -> Result<(), PipelineError> {
        let outcome = self.queue.take(self.wait_timeout()).await;
        self.process(outcome).await
    }

    fn wait_timeout(&self) -> Duration {
        self.config
            .batch_timeout
            .saturating_sub(self.last_flush.elapsed())
    }

    async fn process(&mut self, outcome: Take) -> Result<(), PipelineError> {
        let closed = match outcome {
            Take::Tick(tick) => {
                self.ingest(tick).await;
                false
            }
            Take::TimedOut => false,
            Take::Closed => true,
        };

        if self.should_flush(Instant::now()) {
            self.flush().await;
        }

        if closed {
            Err(PipelineError::QueueClosed)
        } else {
            Ok(())
        }
    }

    async fn ingest(&mut self, tick: Tick) {
        self.stats.ticks_processed += 1;
        let alert = self.alerts.evaluate(&tick);
        self.batch.push(tick);
        telemetry::set_gauge(GaugeMetric::PendingBatch, self.batch.len() as f64);

        if let Some(alert) = alert {
            self.stats.alerts_raised += 1;
            self.alerts.dispatch(&alert).await;
        }
    }

    fn should_flush(&self, now: Instant) -> bool {
        self.batch.len() >= self.config.max_batch_size
            || now.duration_since(self.last_flush) >= self.config.batch_timeout
    }

    /// Write the pending batch. The batch is cleared whatever the outcome;
    /// after `flush_retries` extra failed attempts it is discarded.
    pub async fn flush(&mut self) -> FlushOutcome {
        let outcome = self.write_pending().await;
        self.last_flush = Instant::now();
        telemetry::set_gauge(GaugeMetric::PendingBatch, 0.0);
        outcome
    }

    async fn write_pending(&mut self) -> FlushOutcome {
        if self.batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let batch = std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.config.max_batch_size),
        );
        let count = batch.len();
        let attempts = self.config.flush_retries + 1;

        for attempt in 1..=attempts {
            match self.store.insert_price_batch(&batch).await {
                Ok(()) => {
                    self.stats.flushes += 1;
                    self.stats.records_written += count as u64;
                    telemetry::increment(CounterMetric::Flushes);
                    telemetry::increment_by(CounterMetric::RecordsWritten, count as u64);
                    tracing::debug!(count, attempt, "Flushed batch");
                    return FlushOutcome::Written(count);
                }
                Err(e) => {
                    self.stats.failed_flushes += 1;
                    telemetry::increment(CounterMetric::FlushFailures);
                    if attempt < attempts {
                        tracing::warn!(error = %e, count, attempt, "Batch write failed, retrying");
                        sleep(self.config.retry_delay).await;
                    } else {
                        tracing::error!(
                            error = %e,
                            count,
                            attempts,
                            "Batch write failed, discarding batch"
                        );
                    }
                }
            }
        }

        self.stats.records_discarded += count as u64;
        telemetry::increment_by(CounterMetric::RecordsDiscarded, count as u64);
        FlushOutcome::Discarded(count)
    }

    /// Run until `shutdown` becomes true (or its sender is dropped), then
    /// flush whatever is pending. Ticks still queued at that point are not
    /// drained.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ProcessorStats {
        tracing::info!(
            max_batch_size = self.config.max_batch_size,
            batch_timeout_ms = self.config.batch_timeout.as_millis() as u64,
            "Batch processor started"
        );

        while !*shutdown.borrow() {
            // Only the wait is raced against shutdown; a flush in progress
            // always completes
            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                outcome = self.queue.take(self.wait_timeout()) => outcome,
            };

            if let Err(e) = self.process(outcome).await {
                tracing::warn!(
                    error = %e,
                    backoff_ms = self.config.error_backoff.as_millis() as u64,
                    "Batch processor loop error, backing off"
                );
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(self.config.error_backoff) => {}
                }
            }
        }

        let outcome = self.flush().await;
        tracing::info!(?outcome, stats = ?self.stats, "Batch processor stopped");
        self.stats
    }

    /// Spawn the loop on the runtime
    pub fn spawn(self) -> ProcessorHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        ProcessorHandle { shutdown, task }
    }
}

/// Handle to a spawned processor
pub struct ProcessorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<ProcessorStats>,
}

impl ProcessorHandle {
    /// Stop the loop, wait for the final flush and return the totals
    pub async fn stop(self) -> anyhow::Result<ProcessorStats> {
        let _ = self.shutdown.send(true);
        Ok(self.task.await?)
    }
}
