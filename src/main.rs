// src/main.rs
use hl_ingest::config::Config;
use hl_ingest::domain::errors::AppResult;
use hl_ingest::ingest::{shutdown_channel, Ingestor, LiveWatcher};
use hl_ingest::storage::{InfluxDbSink, PointSink};

use std::env;
use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = match env::var("INGEST_CONFIG_FILE") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting hl_ingest v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Trades root: {}, order statuses root: {}",
        config.paths.trades_base_path.display(),
        config.paths.orders_base_path.display()
    );

    // Create InfluxDB sink
    let sink = InfluxDbSink::new(&config.influxdb)?;
    let mut ingestor = Ingestor::new(sink);

    // Process existing data
    let roots = config.data_roots();
    if let Err(e) = ingestor.backfill(&roots).await {
        log::error!("Backfill failed: {}", e);
        return Err(e.into());
    }

    // Set up file watcher for new data
    let (trigger, shutdown) = shutdown_channel();
    let watcher = match LiveWatcher::new(roots, ingestor, config.retry_policy(), shutdown) {
        Ok(watcher) => watcher,
        Err(e) => {
            log::error!("{}", e);
            return Err(e);
        }
    };
    let handle = tokio::spawn(watcher.run());

    // Wait for shutdown signal
    log::info!("Ingesting. Press Ctrl+C to stop.");
    if let Err(e) = ctrl_c().await {
        log::error!("Failed to listen for control-c event: {}", e);
    }

    log::info!("Shutting down...");
    trigger.trigger();

    match handle.await {
        Ok(ingestor) => {
            let totals = ingestor.totals();
            let mut sink = ingestor.into_sink();
            if let Err(e) = sink.close().await {
                log::error!("Failed to close InfluxDB sink: {}", e);
            }
            log::info!(
                "Ingested {} lines into {} points ({} failures)",
                totals.lines,
                totals.points_stored(),
                totals.failures()
            );
        }
        Err(e) => log::error!("File watcher task failed: {}", e),
    }

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}
