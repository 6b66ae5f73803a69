//! In-memory candle repository.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use candela_types::{Candle, CandleKey, Interval};

use crate::{
    AggregateUpdate, CandleRepository, CandleTransaction, RepositoryError, Result, StoredCandle,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    last_id: i64,
    rows: BTreeMap<i64, Candle>,
    by_key: HashMap<CandleKey, i64>,
}

impl Tables {
    fn stored(&self, id: i64) -> Option<StoredCandle> {
        self.rows.get(&id).map(|candle| StoredCandle {
            id,
            candle: candle.clone(),
        })
    }
}

/// Repository keeping candles in process memory.
///
/// Transactions are serialized: a transaction holds the table lock from
/// [`begin`](CandleRepository::begin) until it is committed or dropped, and
/// stages its writes on a copy of the tables.
#[derive(Debug)]
pub struct MemoryCandleRepository {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for MemoryCandleRepository {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryCandleRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the repository between serving and failing every request
    /// with [`RepositoryError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns every stored candle ordered by row id.
    #[must_use]
    pub fn all(&self) -> Vec<StoredCandle> {
        let tables = self.lock();
        tables
            .rows
            .iter()
            .map(|(&id, candle)| StoredCandle {
                id,
                candle: candle.clone(),
            })
            .collect()
    }

    /// Returns the number of stored candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(
                "in-memory repository switched off".to_string(),
            ))
        }
    }
}

impl CandleRepository for MemoryCandleRepository {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        self.ensure_available()?;
        let committed = self.lock();
        let staged = committed.clone();
        Ok(MemoryTransaction { committed, staged })
    }

    fn find_by_key(&self, key: &CandleKey) -> Result<Option<StoredCandle>> {
        self.ensure_available()?;
        let tables = self.lock();
        Ok(tables.by_key.get(key).and_then(|&id| tables.stored(id)))
    }

    fn find_by_key_range(
        &self,
        symbol: &str,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> Result<Vec<StoredCandle>> {
        self.ensure_available()?;
        let tables = self.lock();
        let mut found: Vec<StoredCandle> = tables
            .rows
            .iter()
            .filter(|(_, c)| {
                c.symbol == symbol && c.interval == interval && (from..=to).contains(&c.open_time)
            })
            .map(|(&id, candle)| StoredCandle {
                id,
                candle: candle.clone(),
            })
            .collect();
        found.sort_by_key(|stored| stored.candle.open_time);
        Ok(found)
    }
}

/// Unit of work on a [`MemoryCandleRepository`].
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    committed: MutexGuard<'a, Tables>,
    staged: Tables,
}

impl CandleTransaction for MemoryTransaction<'_> {
    fn find_by_keys_in(
        &mut self,
        symbol: &str,
        interval: Interval,
        open_times: &[i64],
    ) -> Result<Vec<StoredCandle>> {
        Ok(open_times
            .iter()
            .filter_map(|&open_time| {
                let key = CandleKey::new(symbol, interval, open_time);
                self.staged
                    .by_key
                    .get(&key)
                    .and_then(|&id| self.staged.stored(id))
            })
            .collect())
    }

    fn update_aggregate(&mut self, id: i64, update: &AggregateUpdate) -> Result<usize> {
        Ok(self.staged.rows.get_mut(&id).map_or(0, |candle| {
            update.apply_to(candle);
            1
        }))
    }

    fn bulk_insert(&mut self, candles: &[Candle]) -> Result<()> {
        for candle in candles {
            let key = candle.key();
            if self.staged.by_key.contains_key(&key) {
                return Err(RepositoryError::Conflict(key));
            }
            self.staged.last_id += 1;
            let id = self.staged.last_id;
            self.staged.rows.insert(id, candle.clone());
            self.staged.by_key.insert(key, id);
        }
        Ok(())
    }

    fn commit(self) -> Result<()> {
        let Self {
            mut committed,
            staged,
        } = self;
        *committed = staged;
        Ok(())
    }
}
