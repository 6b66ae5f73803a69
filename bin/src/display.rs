//! Display utilities and output formatting for the candela CLI.

use anyhow::Result;
use candela_lib::prelude::*;
use candela_lib::PersistOutcome;
use serde_json::{Value, json};

/// Format a number of seconds as a short human-readable duration.
pub(crate) fn format_duration(seconds: i64) -> String {
    match seconds {
        s if s % 86_400 == 0 => format!("{} day(s)", s / 86_400),
        s if s % 3_600 == 0 => format!("{} hour(s)", s / 3_600),
        s if s % 60 == 0 => format!("{} minute(s)", s / 60),
        s => format!("{s} second(s)"),
    }
}

fn persist_json(outcome: &PersistOutcome) -> Value {
    json!({
        "groups": outcome.groups,
        "updated": outcome.updated,
        "inserted": outcome.inserted,
        "vanished": outcome.vanished,
        "written": outcome.written(),
    })
}

/// Render a drain outcome as JSON.
pub(crate) fn drain_json(outcome: &DrainOutcome) -> Value {
    match outcome {
        DrainOutcome::Empty => json!({ "status": "empty" }),
        DrainOutcome::Persisted(persisted) => json!({
            "status": "persisted",
            "result": persist_json(persisted),
        }),
        DrainOutcome::Failed { candles } => json!({ "status": "failed", "candles": candles }),
        DrainOutcome::TimedOut { candles } => {
            json!({ "status": "timed_out", "candles": candles })
        }
    }
}

/// Render a health report as JSON.
pub(crate) fn health_json(report: &HealthReport) -> Result<Value> {
    Ok(serde_json::to_value(report)?)
}
