//! CLI interface for breadboard
//!
//! Provides subcommands for:
//! - `run`: Stream ticks, persist batches, raise alerts and serve subscribers
//! - `backfill`: One-off historical fetch
//! - `config`: Show the effective configuration

mod backfill;
mod run;

pub use backfill::BackfillArgs;
pub use run::RunArgs;

use crate::config::{StorageBackend, StorageConfig};
use crate::data::{MemoryStore, ParquetStore, PriceStore};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "breadboard")]
#[command(about = "Real-time market tick ingestion with batched storage and price-drop alerts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion pipeline until Ctrl-C
    Run(RunArgs),
    /// Fetch daily bars once and store them
    Backfill(BackfillArgs),
    /// Show configuration
    Config,
}

/// Storage collaborator selected by config
pub fn build_store(config: &StorageConfig) -> Arc<dyn PriceStore> {
    match config.backend {
        StorageBackend::Parquet => {
            tracing::info!(output_dir = ?config.output_dir, "Using Parquet storage");
            Arc::new(ParquetStore::new(config.output_dir.clone()))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    }
}
