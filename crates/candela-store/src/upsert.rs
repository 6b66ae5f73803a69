//! Merging flushed candles into the repository.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use candela_types::{CandelaError, Candle, Interval};

use crate::{AggregateUpdate, CandleRepository, CandleTransaction};

/// Counts from one [`CandleUpserter::persist`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Distinct `(symbol, interval)` groups in the batch.
    pub groups: usize,
    /// Candles merged into an existing row.
    pub updated: usize,
    /// Candles inserted as new rows.
    pub inserted: usize,
    /// Candles whose row was found but matched no row on update.
    pub vanished: usize,
}

impl PersistOutcome {
    /// Returns the number of candles written.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.updated + self.inserted
    }
}

/// Upserts batches of candles inside one repository transaction.
#[derive(Debug)]
pub struct CandleUpserter<R> {
    repository: Arc<R>,
}

impl<R> Clone for CandleUpserter<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: CandleRepository> CandleUpserter<R> {
    /// Creates an upserter writing to `repository`.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Returns the underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Persists `candles`, merging each into its stored row when one exists.
    ///
    /// Existing rows keep their `open`; `high` and `low` widen, `close` is
    /// replaced and volumes add. All writes commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::PersistenceFailure`] if any repository call
    /// fails. Nothing from the batch is committed in that case.
    pub fn persist(&self, candles: &[Candle]) -> candela_types::Result<PersistOutcome> {
        if candles.is_empty() {
            return Ok(PersistOutcome::default());
        }
        let outcome = self.persist_batch(candles).map_err(CandelaError::persistence)?;
        tracing::debug!(
            groups = outcome.groups,
            updated = outcome.updated,
            inserted = outcome.inserted,
            vanished = outcome.vanished,
            "Persisted candle batch"
        );
        Ok(outcome)
    }

    fn persist_batch(&self, candles: &[Candle]) -> crate::Result<PersistOutcome> {
        let mut groups: BTreeMap<(&str, Interval), Vec<&Candle>> = BTreeMap::new();
        for candle in candles {
            groups
                .entry((candle.symbol.as_str(), candle.interval))
                .or_default()
                .push(candle);
        }

        let mut outcome = PersistOutcome {
            groups: groups.len(),
            ..PersistOutcome::default()
        };
        let mut inserts = Vec::new();
        let mut tx = self.repository.begin()?;

        for ((symbol, interval), group) in &groups {
            let open_times: Vec<i64> = group.iter().map(|c| c.open_time).collect();
            let existing: HashMap<i64, i64> = tx
                .find_by_keys_in(symbol, *interval, &open_times)?
                .into_iter()
                .map(|stored| (stored.candle.open_time, stored.id))
                .collect();

            for &candle in group {
                let Some(&id) = existing.get(&candle.open_time) else {
                    inserts.push(candle.clone());
                    continue;
                };
                if tx.update_aggregate(id, &AggregateUpdate::from(candle))? == 0 {
                    tracing::warn!(id, candle = %candle.key(), "No row updated for stored candle");
                    outcome.vanished += 1;
                } else {
                    outcome.updated += 1;
                }
            }
        }

        if !inserts.is_empty() {
            tx.bulk_insert(&inserts)?;
        }
        outcome.inserted = inserts.len();
        tx.commit()?;
        Ok(outcome)
    }
}
