//! History command implementation.
//!
//! Reads persisted candles straight from the SQLite database, without
//! starting the aggregation pipeline.

use anyhow::{Context, Result, bail};
use candela_lib::prelude::*;
use candela_lib::{CandleHistory, HistoryError};
use std::path::PathBuf;
use std::sync::Arc;

/// Print candles for `symbol`/`interval` with open times in `[from, to]`.
pub(crate) fn history(
    symbol: &str,
    interval: &str,
    from: i64,
    to: i64,
    database: Option<PathBuf>,
) -> Result<()> {
    let path = database.unwrap_or_else(ServiceConfig::default_database_path);
    if !path.exists() {
        bail!("No candle database at {}", path.display());
    }

    let repository = Arc::new(
        SqliteCandleRepository::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?,
    );
    let history = CandleHistory::new(repository, Vec::new());

    let response = match history.query(symbol, interval, from, to) {
        Ok(response) => response,
        Err(HistoryError::BadRequest(message)) => bail!("Invalid query: {message}"),
        Err(e) => return Err(e).context("Failed to read candle history"),
    };

    tracing::debug!(candles = response.len(), "Loaded history");
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
