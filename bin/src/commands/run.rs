//! Run command implementation.
//!
//! Starts the service on SQLite, feeds it from the tick simulator and shuts
//! it down gracefully on Ctrl+C or after a fixed duration.

use crate::display::{drain_json, health_json};
use anyhow::{Context, Result};
use candela_lib::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Run the service until interrupted or `duration` seconds elapse.
pub(crate) async fn run(
    config: Option<PathBuf>,
    database: Option<PathBuf>,
    duration: Option<u64>,
) -> Result<()> {
    let config = match config {
        Some(path) => ServiceConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    let path = database.unwrap_or_else(ServiceConfig::default_database_path);
    let repository = Arc::new(
        SqliteCandleRepository::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?,
    );
    tracing::info!(database = %path.display(), "Opened candle database");

    let service = CandleService::new(config, repository).context("Invalid configuration")?;
    service.start();

    let simulator = tokio::spawn(
        service
            .simulator()
            .run(service.engine().clone(), service.shutdown_signal()),
    );

    match duration {
        Some(secs) => {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "Run duration elapsed");
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for Ctrl+C")?;
                    tracing::info!("Received Ctrl+C");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            tracing::info!("Received Ctrl+C");
        }
    }

    // Stop intake first so the simulator exits before the drain
    service.begin_shutdown();
    let generated = simulator.await.context("Simulator task failed")?;
    let drained = service.shutdown().await;

    let summary = serde_json::json!({
        "ticks_aggregated": generated,
        "drain": drain_json(&drained),
        "health": health_json(&service.health())?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
