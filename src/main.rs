use breadboard::cli::{Cli, Commands};
use breadboard::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    breadboard::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting ingestion pipeline");
            args.execute(config).await?;
        }
        Commands::Backfill(args) => {
            tracing::info!("Starting historical backfill");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Feed: {} ({} symbols)", config.feed.url, config.feed.symbols.len());
            println!("  Symbols: {}", config.feed.symbols.join(", "));
            println!(
                "  Reconnect: {}s {:?}",
                config.feed.reconnect_delay_secs, config.feed.backoff
            );
            println!(
                "  Pipeline: queue={}, batch={}, timeout={}s, retries={}",
                config.pipeline.queue_capacity,
                config.pipeline.max_batch_size,
                config.pipeline.batch_timeout_secs,
                config.pipeline.flush_retries
            );
            println!("  Alert threshold: {}%", config.alerts.threshold);
            println!(
                "  Storage: {:?} {}",
                config.storage.backend,
                config.storage.output_dir.display()
            );
            println!("  Server: {} (enabled={})", config.server.bind_addr, config.server.enabled);
            println!(
                "  History: every {}h, period {} (enabled={})",
                config.history.interval_hours, config.history.period, config.history.enabled
            );
        }
    }

    Ok(())
}
