//! Scoped capacity changes.
//!
//! A [`ThroughputScope`] raises (or lowers) the provisioned capacity of one
//! or more tables for the duration of a piece of work and restores the
//! previous capacities afterwards, also when the work fails.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::{Error, Result, StoreError};
use crate::store::{Store, wait_table_active};
use crate::types::Capacity;

/// Capacity override for a set of tables.
///
/// ```ignore
/// ThroughputScope::new(&db)
///     .table("store", Capacity::table(100, 100).with_index("StoreCompanyIndex", 20, 10))
///     .run(|| import_stores(&db))?;
/// ```
pub struct ThroughputScope<'a, S: Store + ?Sized> {
    store: &'a S,
    targets: BTreeMap<String, Capacity>,
    previous: BTreeMap<String, Capacity>,
    restore: bool,
    wait_on_enter: bool,
    wait_on_exit: bool,
}

impl<'a, S: Store + ?Sized> ThroughputScope<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            targets: BTreeMap::new(),
            previous: BTreeMap::new(),
            restore: true,
            wait_on_enter: true,
            wait_on_exit: false,
        }
    }

    /// Capacity to apply to `table` on entry.
    pub fn table(mut self, table: impl Into<String>, capacity: Capacity) -> Self {
        self.targets.insert(table.into(), capacity);
        self
    }

    /// Capacity to restore for `table` on exit. Tables without one get the
    /// capacity they had on entry.
    pub fn previous(mut self, table: impl Into<String>, capacity: Capacity) -> Self {
        self.previous.insert(table.into(), capacity);
        self
    }

    /// Whether to restore on exit (default `true`).
    pub fn restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Whether to wait for the tables to become active after entry (default `true`).
    pub fn wait_on_enter(mut self, wait: bool) -> Self {
        self.wait_on_enter = wait;
        self
    }

    /// Whether to wait for the tables to become active after exit (default `false`).
    pub fn wait_on_exit(mut self, wait: bool) -> Self {
        self.wait_on_exit = wait;
        self
    }

    /// Apply the capacities. The returned guard restores them on
    /// [`ThroughputGuard::exit`] or, failing that, when dropped.
    ///
    /// If a table fails, the tables already changed are restored before the
    /// error is returned.
    pub fn enter(mut self) -> Result<ThroughputGuard<'a, S>> {
        for table in self.targets.keys() {
            if !self.previous.contains_key(table) {
                let current = self.store.describe_table(table)?.capacity();
                self.previous.insert(table.clone(), current);
            }
        }
        let mut applied = Vec::with_capacity(self.targets.len());
        for (table, capacity) in &self.targets {
            if let Err(e) = apply_one(self.store, table, capacity) {
                self.roll_back(&applied);
                return Err(e);
            }
            applied.push(table.as_str());
        }
        if self.wait_on_enter {
            for table in self.targets.keys() {
                wait_table_active(self.store, table)?;
            }
        }
        Ok(ThroughputGuard {
            scope: self,
            done: false,
        })
    }

    fn roll_back(&self, tables: &[&str]) {
        for &table in tables {
            let Some(previous) = self.previous.get(table) else {
                continue;
            };
            if let Err(e) = apply_one(self.store, table, previous) {
                warn!(table, error = %e, "failed to roll back table capacity");
            }
        }
    }

    /// Run `work` with the capacities applied.
    ///
    /// An error from `work` takes precedence over an error from restoring.
    pub fn run<T>(self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.enter()?;
        let result = work();
        let restored = guard.exit();
        let value = result?;
        restored?;
        Ok(value)
    }
}

/// An entered [`ThroughputScope`].
pub struct ThroughputGuard<'a, S: Store + ?Sized> {
    scope: ThroughputScope<'a, S>,
    done: bool,
}

impl<S: Store + ?Sized> ThroughputGuard<'_, S> {
    /// Restore the previous capacities (unless restoring is switched off).
    pub fn exit(mut self) -> Result<()> {
        self.done = true;
        self.restore()
    }

    fn restore(&self) -> Result<()> {
        if !self.scope.restore {
            return Ok(());
        }
        apply(
            self.scope.store,
            &self.scope.previous,
            self.scope.wait_on_exit,
        )
    }
}

impl<S: Store + ?Sized> Drop for ThroughputGuard<'_, S> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.restore() {
            warn!(error = %e, "failed to restore table capacity");
        }
    }
}

/// Apply capacities table by table.
///
/// A limit error from a local store is logged and skipped: local stores
/// refuse capacity changes that a real deployment would accept.
fn apply<S: Store + ?Sized>(
    store: &S,
    capacities: &BTreeMap<String, Capacity>,
    wait: bool,
) -> Result<()> {
    for (table, capacity) in capacities {
        apply_one(store, table, capacity)?;
    }
    if wait {
        for table in capacities.keys() {
            wait_table_active(store, table)?;
        }
    }
    Ok(())
}

fn apply_one<S: Store + ?Sized>(store: &S, table: &str, capacity: &Capacity) -> Result<()> {
    match store.update_table_capacity(table, capacity) {
        Ok(()) => info!(table, "applied capacity"),
        Err(Error::Store(StoreError::LimitExceeded(name))) if store.is_local() => {
            warn!(table = %name, "local store refused capacity change, ignoring");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
