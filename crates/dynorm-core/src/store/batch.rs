//! Bounded batch writes.

use tracing::{debug, warn};

use super::{Store, WriteOp};
use crate::error::Result;
use crate::types::{BATCH_WRITE_LIMIT, Item};

/// Accumulates put/delete operations for one table and flushes them to the
/// store every [`BATCH_WRITE_LIMIT`] operations.
///
/// Call [`BatchWriter::finish`] to flush the remainder and observe errors.
/// A writer dropped with pending operations flushes them on a best-effort
/// basis and logs a failure.
pub struct BatchWriter<'a, S: Store + ?Sized> {
    store: &'a S,
    table: String,
    pending: Vec<WriteOp>,
    flushes: usize,
}

impl<'a, S: Store + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            pending: Vec::with_capacity(BATCH_WRITE_LIMIT),
            flushes: 0,
        }
    }

    /// Queue a full-item write.
    pub fn put_item(&mut self, item: Item) -> Result<()> {
        self.push(WriteOp::Put(item))
    }

    /// Queue a delete by key attributes.
    pub fn delete_item(&mut self, key: Item) -> Result<()> {
        self.push(WriteOp::Delete(key))
    }

    /// Number of successful flushes so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Number of queued, not yet flushed operations.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Send the queued operations to the store now. On failure the queued
    /// operations are discarded.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let ops = std::mem::take(&mut self.pending);
        debug!(table = %self.table, ops = ops.len(), "flushing batch");
        self.store.write_batch(&self.table, ops)?;
        self.flushes += 1;
        Ok(())
    }

    /// Flush the remaining operations and return the number of flushes issued.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.flushes)
    }

    fn push(&mut self, op: WriteOp) -> Result<()> {
        self.pending.push(op);
        if self.pending.len() >= BATCH_WRITE_LIMIT {
            self.flush()?;
        }
        Ok(())
    }
}

impl<S: Store + ?Sized> Drop for BatchWriter<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(table = %self.table, error = %e, "dropping batch writer failed to flush");
        }
    }
}
