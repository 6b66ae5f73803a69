//! Concurrent store of active (not yet flushed) candles.

use std::sync::{PoisonError, RwLock};

use candela_types::{Candle, CandleKey};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

/// How `open` and `close` are chosen when ticks for one bucket race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrdering {
    /// `open` is the first tick applied and `close` the last one applied.
    ///
    /// Under concurrent arrival "last" is whichever update wins the race,
    /// not necessarily the tick with the latest timestamp.
    #[default]
    Arrival,
    /// `open` is the tick with the earliest event time and `close` the tick
    /// with the latest; ties on `close` go to the later arrival.
    EventTime,
}

/// Result of applying a price to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// No candle existed for the key; one was opened.
    Created,
    /// The price was merged into an existing candle.
    Merged,
}

#[derive(Debug, Clone)]
struct ActiveCandle {
    candle: Candle,
    first_seen: i64,
    last_seen: i64,
}

impl ActiveCandle {
    fn opened(key: CandleKey, price: f64, timestamp: i64) -> Self {
        Self {
            candle: Candle::opened(key, price),
            first_seen: timestamp,
            last_seen: timestamp,
        }
    }

    fn apply(&mut self, price: f64, timestamp: i64, ordering: PriceOrdering) {
        match ordering {
            PriceOrdering::Arrival => self.candle.merge_price(price),
            PriceOrdering::EventTime => {
                let candle = &mut self.candle;
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.volume += 1;
                if timestamp < self.first_seen {
                    candle.open = price;
                }
                if timestamp >= self.last_seen {
                    candle.close = price;
                }
            }
        }
        self.first_seen = self.first_seen.min(timestamp);
        self.last_seen = self.last_seen.max(timestamp);
    }
}

/// Concurrency-safe map from [`CandleKey`] to the candle being built.
///
/// Updates to one key are serialized by the map's shard locks. The outer
/// lock is only taken exclusively by [`take_snapshot`](Self::take_snapshot),
/// so an update observes either the pre-snapshot map or the fresh one, never
/// a half-drained view.
#[derive(Debug, Default)]
pub struct CandleStore {
    active: RwLock<DashMap<CandleKey, ActiveCandle>>,
}

impl CandleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the candle for `key` or merges `price` into it.
    pub fn apply(
        &self,
        key: CandleKey,
        price: f64,
        timestamp: i64,
        ordering: PriceOrdering,
    ) -> Applied {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        match active.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().apply(price, timestamp, ordering);
                Applied::Merged
            }
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                entry.insert(ActiveCandle::opened(key, price, timestamp));
                Applied::Created
            }
        }
    }

    /// Removes and returns every active candle in one step.
    ///
    /// The exclusive section only swaps the map out; converting the drained
    /// entries happens after the lock is released.
    pub fn take_snapshot(&self) -> Vec<Candle> {
        let drained = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *active)
        };
        drained.into_iter().map(|(_, active)| active.candle).collect()
    }

    /// Merges candles from a failed flush back into the store.
    ///
    /// The returned candles predate anything aggregated since the snapshot,
    /// so they contribute the `open` and the live candle keeps the `close`.
    pub fn restore(&self, candles: Vec<Candle>) {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        for candle in candles {
            match active.entry(candle.key()) {
                Entry::Occupied(mut entry) => {
                    let live = entry.get_mut();
                    let mut merged = candle;
                    merged.absorb_later(&live.candle);
                    live.candle = merged;
                    live.first_seen = i64::MIN;
                }
                Entry::Vacant(entry) => {
                    entry.insert(ActiveCandle {
                        candle,
                        first_seen: i64::MIN,
                        last_seen: i64::MIN,
                    });
                }
            }
        }
    }

    /// Returns a copy of the active candle for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &CandleKey) -> Option<Candle> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        active.get(key).map(|entry| entry.candle.clone())
    }

    /// Returns copies of all active candles without removing them.
    #[must_use]
    pub fn candles(&self) -> Vec<Candle> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        active.iter().map(|entry| entry.candle.clone()).collect()
    }

    /// Returns the number of active candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if there are no active candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
