//! Service configuration loaded from TOML.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use candela_aggregate::{EngineConfig, PriceOrdering};
use candela_types::{DEFAULT_LATE_TOLERANCE_PCT, Interval, UnsupportedInterval};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured interval is not supported.
    #[error(transparent)]
    UnsupportedInterval(#[from] UnsupportedInterval),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What happens to a snapshot whose flush failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Discard the snapshot; its candles are lost.
    #[default]
    Drop,
    /// Merge the snapshot back into the live store for the next flush.
    Requeue,
}

/// Top-level service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interval identifiers every tick is aggregated into.
    pub intervals: Vec<String>,
    /// Flush period in milliseconds.
    pub flush_rate_ms: u64,
    /// Divisor applied to `bid + ask`.
    pub price_divisor: f64,
    /// Late-tick tolerance in percent of the interval.
    pub late_tolerance_pct: u32,
    /// Upper bound on the shutdown drain, in milliseconds.
    pub drain_timeout_ms: u64,
    /// Grace period for in-flight aggregation tasks at shutdown.
    pub worker_grace_ms: u64,
    /// Maximum number of interval tasks running at once.
    pub max_concurrent_intervals: usize,
    /// Upper bound on how long one ingest waits for its interval tasks.
    pub event_timeout_ms: u64,
    /// Handling of snapshots that failed to persist.
    pub failure_policy: FailurePolicy,
    /// Choice of `open` and `close` under concurrent arrival.
    pub price_ordering: PriceOrdering,
    /// Symbols the history query accepts. Empty accepts any symbol.
    pub symbols: Vec<String>,
    /// Tick simulator settings.
    pub simulator: SimulatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            intervals: vec!["1s".to_string(), "1m".to_string()],
            flush_rate_ms: 1_000,
            price_divisor: 2.0,
            late_tolerance_pct: DEFAULT_LATE_TOLERANCE_PCT,
            drain_timeout_ms: 10_000,
            worker_grace_ms: 30_000,
            max_concurrent_intervals: 10,
            event_timeout_ms: 5_000,
            failure_policy: FailurePolicy::Drop,
            price_ordering: PriceOrdering::Arrival,
            symbols: Vec::new(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// Keys missing from the file take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedInterval`] for an unknown interval
    /// and [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_intervals()?;
        if self.flush_rate_ms == 0 {
            return Err(invalid("flush_rate_ms must be positive"));
        }
        if !self.price_divisor.is_finite() || self.price_divisor <= 0.0 {
            return Err(invalid(format!(
                "price_divisor must be a positive number, got {}",
                self.price_divisor
            )));
        }
        if self.late_tolerance_pct > 100 {
            return Err(invalid(format!(
                "late_tolerance_pct must be at most 100, got {}",
                self.late_tolerance_pct
            )));
        }
        if self.max_concurrent_intervals == 0 {
            return Err(invalid("max_concurrent_intervals must be positive"));
        }
        if self.event_timeout_ms == 0 {
            return Err(invalid("event_timeout_ms must be positive"));
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("symbols cannot contain blank entries"));
        }
        self.simulator.validate()
    }

    /// Returns the configured intervals, parsed and in configured order.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, contains duplicates, or names
    /// an unsupported interval.
    pub fn parsed_intervals(&self) -> Result<Vec<Interval>, ConfigError> {
        if self.intervals.is_empty() {
            return Err(invalid("at least one interval must be configured"));
        }
        let mut seen = BTreeSet::new();
        let mut parsed = Vec::with_capacity(self.intervals.len());
        for raw in &self.intervals {
            let interval: Interval = raw.parse()?;
            if !seen.insert(interval) {
                return Err(invalid(format!("interval '{raw}' is configured twice")));
            }
            parsed.push(interval);
        }
        Ok(parsed)
    }

    /// Builds the aggregation engine settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the intervals are invalid.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            intervals: self.parsed_intervals()?,
            price_divisor: self.price_divisor,
            late_tolerance_pct: self.late_tolerance_pct,
            ordering: self.price_ordering,
            event_timeout: Duration::from_millis(self.event_timeout_ms),
        })
    }

    /// Returns the flush period.
    #[must_use]
    pub const fn flush_rate(&self) -> Duration {
        Duration::from_millis(self.flush_rate_ms)
    }

    /// Returns the drain timeout.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Returns the worker grace period.
    #[must_use]
    pub const fn worker_grace(&self) -> Duration {
        Duration::from_millis(self.worker_grace_ms)
    }

    /// Returns the default database location.
    ///
    /// Uses the `directories` crate to find the platform data directory:
    /// - Linux: `~/.local/share/candela/candles.sqlite`
    /// - macOS: `~/Library/Application Support/candela/candles.sqlite`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\candela\candles.sqlite`
    ///
    /// Falls back to `~/.candela/candles.sqlite`.
    #[must_use]
    pub fn default_database_path() -> PathBuf {
        ProjectDirs::from("", "", "candela")
            .map_or_else(dirs_fallback, |proj_dirs| proj_dirs.data_dir().to_path_buf())
            .join("candles.sqlite")
    }
}

/// Settings for the random tick generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Symbols ticks are drawn for.
    pub symbols: Vec<String>,
    /// Base price per symbol; symbols without an entry use 100.
    pub base_prices: BTreeMap<String, f64>,
    /// Pause between generated ticks, in milliseconds.
    pub event_rate_ms: u64,
    /// Width of the uniform band added to the base price.
    pub price_variation: f64,
    /// Half spread around the generated price.
    pub spread: f64,
    /// Seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let base_prices = [("BTC-USD", 30_000.0), ("ETH-USD", 2_000.0), ("SOL-USD", 100.0)];
        Self {
            symbols: base_prices.iter().map(|(s, _)| (*s).to_string()).collect(),
            base_prices: base_prices
                .iter()
                .map(|(s, p)| ((*s).to_string(), *p))
                .collect(),
            event_rate_ms: 100,
            price_variation: 10.0,
            spread: 0.5,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Base price used when a symbol has no configured base.
    pub const FALLBACK_BASE_PRICE: f64 = 100.0;

    /// Returns the base price for `symbol`.
    #[must_use]
    pub fn base_price(&self, symbol: &str) -> f64 {
        self.base_prices
            .get(symbol)
            .copied()
            .unwrap_or(Self::FALLBACK_BASE_PRICE)
    }

    /// Returns the pause between generated ticks.
    #[must_use]
    pub const fn event_rate(&self) -> Duration {
        Duration::from_millis(self.event_rate_ms)
    }

    /// Checks the simulator settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() || self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("simulator.symbols must list at least one non-blank symbol"));
        }
        if self.event_rate_ms == 0 {
            return Err(invalid("simulator.event_rate_ms must be positive"));
        }
        if !self.price_variation.is_finite() || self.price_variation < 0.0 {
            return Err(invalid("simulator.price_variation must be non-negative"));
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(invalid("simulator.spread must be non-negative"));
        }
        if let Some((symbol, price)) = self
            .base_prices
            .iter()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(invalid(format!(
                "simulator.base_prices.{symbol} must be non-negative, got {price}"
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".candela")
}
