//! Read-through, write-back record cache over a [`Table`].
//!
//! Each key the cache has seen is either confirmed missing at the store or
//! holds a record. A key is read from the store at most once per cache
//! lifetime; changes are written back explicitly with
//! [`CachedTable::save_data`] or [`CachedTable::save_data_batch`].

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde_json::Value;
use tracing::{debug, warn};

use super::record::{Entity, Record};
use super::table::Table;
use crate::error::{Error, Result};
use crate::store::{BatchWriter, Store};

/// State of one key in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry<R> {
    /// Never looked up.
    Absent,
    /// Looked up; the store has no item.
    NotFound,
    Present(R),
}

/// Cache effectiveness counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the store.
    pub store_reads: u64,
}

/// Outcome of a write-back.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Records handed to the store.
    pub saved: usize,
    pub failed: usize,
    /// Batch flushes issued (batched write-back only).
    pub flushes: usize,
    /// First error met when errors are ignored.
    pub first_error: Option<Error>,
}

impl SaveReport {
    fn record_failure(&mut self, table: &str, error: Error) {
        self.record_failures(table, 1, error);
    }

    /// `count` records were not persisted because of `error`.
    fn record_failures(&mut self, table: &str, count: usize, error: Error) {
        warn!(table, count, error = %error, "ignoring write-back error");
        self.failed += count;
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }
}

/// A [`Table`] with a per-instance record cache.
///
/// Not synchronized; wrap it in a lock to share it between threads.
pub struct CachedTable<E: Entity, S: Store> {
    table: Table<E, S>,
    entries: BTreeMap<Vec<u8>, CacheEntry<Record<E>>>,
    load_from_store: bool,
    stats: CacheStats,
}

impl<E: Entity, S: Store> CachedTable<E, S> {
    pub fn new(table: Table<E, S>) -> Self {
        Self {
            table,
            entries: BTreeMap::new(),
            load_from_store: true,
            stats: CacheStats::default(),
        }
    }

    /// With `false`, a cache miss creates a new record instead of reading
    /// the store.
    pub fn with_load_from_store(mut self, load: bool) -> Self {
        self.load_from_store = load;
        self
    }

    pub fn set_load_from_store(&mut self, load: bool) {
        self.load_from_store = load;
    }

    pub fn table(&self) -> &Table<E, S> {
        &self.table
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of keys with a known state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached record at the given keys, reading the store on a miss.
    ///
    /// A key the store confirmed missing fails with [`Error::NotFound`]
    /// without another store read. Empty keys are reported as not found.
    pub fn get(&mut self, hash: impl Into<Value>, range: Option<Value>) -> Result<&mut Record<E>> {
        self.fetch(hash.into(), range, false)
    }

    /// Like [`CachedTable::get`], but a missing item yields a new record,
    /// which is cached.
    pub fn get_or_create(
        &mut self,
        hash: impl Into<Value>,
        range: Option<Value>,
    ) -> Result<&mut Record<E>> {
        self.fetch(hash.into(), range, true)
    }

    /// Like [`CachedTable::get`], with not-found mapped to `None`.
    pub fn find(
        &mut self,
        hash: impl Into<Value>,
        range: Option<Value>,
    ) -> Result<Option<&mut Record<E>>> {
        match self.fetch(hash.into(), range, false) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Put a record into the cache, replacing whatever the key held.
    ///
    /// Nothing is written to the store until the next write-back.
    pub fn save(&mut self, mut record: Record<E>) -> Result<()> {
        let key = self.table.record_key(&mut record)?;
        let cache_key = self.table.encoded_key(&key)?;
        debug!(table = %self.table.name(), "caching record");
        self.entries.insert(cache_key, CacheEntry::Present(record));
        Ok(())
    }

    /// Delete at the store and remember the key as missing.
    pub fn delete(&mut self, hash: impl Into<Value>, range: Option<Value>) -> Result<Record<E>> {
        let hash: Value = hash.into();
        let key = self.table.key_for(Some(&hash), range.as_ref())?;
        let cache_key = self.table.encoded_key(&key)?;
        let result = self.table.delete(hash, range);
        match &result {
            Ok(_) => {
                self.entries.insert(cache_key, CacheEntry::NotFound);
            }
            Err(e) if e.is_not_found() => {
                self.entries.insert(cache_key, CacheEntry::NotFound);
            }
            Err(_) => {}
        }
        result
    }

    /// State of a key without touching the store.
    pub fn state(
        &self,
        hash: impl Into<Value>,
        range: Option<Value>,
    ) -> Result<CacheEntry<&Record<E>>> {
        let hash: Value = hash.into();
        let key = self.table.key_for(Some(&hash), range.as_ref())?;
        let cache_key = self.table.encoded_key(&key)?;
        Ok(match self.entries.get(&cache_key) {
            None | Some(CacheEntry::Absent) => CacheEntry::Absent,
            Some(CacheEntry::NotFound) => CacheEntry::NotFound,
            Some(CacheEntry::Present(record)) => CacheEntry::Present(record),
        })
    }

    /// Every cached record, in key order.
    pub fn get_data(&self) -> Vec<&Record<E>> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                CacheEntry::Present(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Forget every key.
    pub fn reset(&mut self) {
        debug!(table = %self.table.name(), entries = self.entries.len(), "cache reset");
        self.entries.clear();
    }

    /// Write every cached record back, one save per record.
    ///
    /// With `ignore_errors` a failing record is counted and skipped and the
    /// first error is kept in the report; otherwise the first error aborts.
    pub fn save_data(&mut self, ignore_errors: bool) -> Result<SaveReport> {
        let mut report = SaveReport::default();
        for entry in self.entries.values_mut() {
            let CacheEntry::Present(record) = entry else {
                continue;
            };
            match self.table.save(record) {
                Ok(()) => report.saved += 1,
                Err(e) if ignore_errors => report.record_failure(self.table.name(), e),
                Err(e) => return Err(e),
            }
        }
        debug!(table = %self.table.name(), saved = report.saved, failed = report.failed, "write-back done");
        Ok(report)
    }

    /// Write every cached record back through a [`BatchWriter`].
    ///
    /// Records are written whole and only count as saved once their flush
    /// succeeds. Error handling follows [`CachedTable::save_data`]; every
    /// record of a failed flush counts as a failure.
    pub fn save_data_batch(&mut self, ignore_errors: bool) -> Result<SaveReport> {
        let mut report = SaveReport::default();
        let table = &self.table;
        let mut batch = BatchWriter::new(table.store(), table.name());
        for entry in self.entries.values_mut() {
            let CacheEntry::Present(record) = entry else {
                continue;
            };
            let item = match table.full_item(record) {
                Ok(item) => item,
                Err(e) if ignore_errors => {
                    report.record_failure(table.name(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            // Queued records including this one; all of them go out if the
            // push triggers a flush.
            let in_flight = batch.pending() + 1;
            match batch.put_item(item) {
                Ok(()) if batch.pending() == 0 => report.saved += in_flight,
                Ok(()) => {}
                Err(e) if ignore_errors => report.record_failures(table.name(), in_flight, e),
                Err(e) => return Err(e),
            }
        }
        let in_flight = batch.pending();
        match batch.flush() {
            Ok(()) => report.saved += in_flight,
            Err(e) if ignore_errors => report.record_failures(table.name(), in_flight, e),
            Err(e) => return Err(e),
        }
        report.flushes = batch.flushes();
        debug!(
            table = %table.name(),
            saved = report.saved,
            flushes = report.flushes,
            "batched write-back done"
        );
        Ok(report)
    }

    fn fetch(&mut self, hash: Value, range: Option<Value>, create: bool) -> Result<&mut Record<E>> {
        let key = self.table.lookup_key(Some(&hash), range.as_ref())?;
        let cache_key = self.table.encoded_key(&key)?;
        let table = &self.table;

        let entry = match self.entries.entry(cache_key) {
            Entry::Occupied(occupied) => {
                self.stats.hits += 1;
                let entry = occupied.into_mut();
                if !matches!(entry, CacheEntry::Present(_)) {
                    if !create {
                        return Err(Error::not_found(table.name()));
                    }
                    *entry = CacheEntry::Present(table.new_record(&key)?);
                }
                entry
            }
            Entry::Vacant(vacant) => {
                let loaded = if self.load_from_store {
                    self.stats.store_reads += 1;
                    match table.get_by_key(&key, create) {
                        Ok(record) => record,
                        Err(e) if e.is_not_found() => {
                            vacant.insert(CacheEntry::NotFound);
                            return Err(e);
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    table.new_record(&key)?
                };
                vacant.insert(CacheEntry::Present(loaded))
            }
        };

        match entry {
            CacheEntry::Present(record) => Ok(record),
            _ => Err(Error::not_found(table.name())),
        }
    }
}
