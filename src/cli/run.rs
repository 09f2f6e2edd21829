//! Run command implementation

use crate::alert::{AlertEngine, FanoutAlertListener, LogAlertListener, MetricsAlertListener};
use crate::config::Config;
use crate::fanout::{serve, FanoutHub, ServerState};
use crate::feed::FeedClient;
use crate::history::{HistoricalJob, YahooChartClient};
use crate::pipeline::{ingestion_queue, BatchProcessor};
use crate::ws::WsClient;
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the tracked symbols (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Do not start the subscriber WebSocket / health server
    #[arg(long)]
    pub no_server: bool,

    /// Do not run the scheduled historical job
    #[arg(long)]
    pub no_history: bool,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if !self.symbols.is_empty() {
            config.feed.symbols = self.symbols.clone();
        }
        config.validate()?;

        let store = super::build_store(&config.storage);
        let (queue_tx, queue_rx) = ingestion_queue(config.pipeline.queue_capacity);
        let hub = Arc::new(FanoutHub::new(config.server.subscriber_buffer));

        let alerts = Arc::new(AlertEngine::new(config.alerts.threshold));
        alerts.register(Arc::new(LogAlertListener)).await;
        alerts.register(Arc::new(MetricsAlertListener)).await;
        alerts
            .register(Arc::new(FanoutAlertListener::new(hub.clone())))
            .await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let processor = BatchProcessor::new(
            queue_rx,
            store.clone(),
            alerts,
            config.pipeline.batch_config(),
        )
        .spawn();

        let transport = Arc::new(WsClient::new(config.feed.ws_config()));
        let feed = FeedClient::new(
            transport,
            config.feed.client_config(),
            queue_tx.clone(),
            hub.clone(),
        );
        let feed_state = feed.state();
        let feed_task = tokio::spawn(feed.run(shutdown_rx.clone()));

        let server_task = if config.server.enabled && !self.no_server {
            let addr = config.server.socket_addr()?;
            let state = ServerState {
                hub,
                queue: queue_tx,
                feed_state,
            };
            let shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = serve(addr, state, shutdown).await {
                    tracing::error!(error = %e, "Fan-out server failed");
                }
            }))
        } else {
            None
        };

        let history_task = if config.history.enabled && !self.no_history {
            let source = Arc::new(YahooChartClient::new(config.history.yahoo_config())?);
            let job = Arc::new(HistoricalJob::new(source, store));
            Some(job.spawn_schedule(
                config.feed.symbols.clone(),
                config.history.range(),
                config.history.interval(),
                shutdown_rx,
            ))
        } else {
            None
        };

        tracing::info!(
            symbols = config.feed.symbols.len(),
            server = server_task.is_some(),
            history = history_task.is_some(),
            "Pipeline running, press Ctrl-C to stop"
        );
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");

        let _ = shutdown_tx.send(true);
        feed_task.await?;
        let stats = processor.stop().await?;
        if let Some(task) = server_task {
            task.await?;
        }
        if let Some(task) = history_task {
            task.await?;
        }

        tracing::info!(
            ticks = stats.ticks_processed,
            alerts = stats.alerts_raised,
            written = stats.records_written,
            discarded = stats.records_discarded,
            "Pipeline stopped"
        );
        Ok(())
    }
}
