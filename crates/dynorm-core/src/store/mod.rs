//! The backend contract consumed by the table facade, and its in-memory
//! implementation.
//!
//! Every method takes the logical table name; the store applies its
//! configured table prefix.

pub mod batch;
pub mod filter;
pub mod memory;

use std::thread;

use serde_json::Value;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::types::{Capacity, Item, TableDescription, TableSchema, TableStatus};

pub use batch::BatchWriter;
pub use filter::{Condition, Predicate};
pub use memory::MemoryStore;

/// A lazy, one-pass sequence of stored items.
pub type ItemStream<'a> = Box<dyn Iterator<Item = Result<Item>> + 'a>;

/// One attribute change of a partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeUpdate {
    Put { name: String, value: Value },
    Remove { name: String },
}

/// One operation of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Write the whole item, replacing any existing one.
    Put(Item),
    /// Delete by key attributes.
    Delete(Item),
}

/// A query: key conditions on one partition (or on an index), plus
/// optional post-filters on any field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub key_conditions: Vec<Predicate>,
    pub filters: Vec<Predicate>,
    pub index: Option<String>,
    pub limit: Option<usize>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field__op` key condition.
    pub fn key(mut self, expr: &str, value: impl Into<Value>) -> Result<Self> {
        self.key_conditions.push(Predicate::parse(expr, value)?);
        Ok(self)
    }

    /// Add a `field__op` post-filter.
    pub fn filter(mut self, expr: &str, value: impl Into<Value>) -> Result<Self> {
        self.filters.push(Predicate::parse(expr, value)?);
        Ok(self)
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A scan: filters evaluated against every item of the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRequest {
    pub filters: Vec<Predicate>,
    pub limit: Option<usize>,
}

impl ScanRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field__op` filter.
    pub fn filter(mut self, expr: &str, value: impl Into<Value>) -> Result<Self> {
        self.filters.push(Predicate::parse(expr, value)?);
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Storage backend for tables.
pub trait Store {
    fn config(&self) -> &StoreConfig;

    /// Whether this is a local/test deployment.
    fn is_local(&self) -> bool {
        self.config().local
    }

    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create a table. Creating a table that already exists is a no-op.
    fn create_table(&self, schema: &TableSchema) -> Result<()>;

    fn describe_table(&self, table: &str) -> Result<TableDescription>;

    /// Change the table and/or index capacities.
    fn update_table_capacity(&self, table: &str, capacity: &Capacity) -> Result<()>;

    fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>>;

    /// Write a whole item. With `overwrite` false an existing item with the
    /// same key is an error.
    fn put_item(&self, table: &str, item: Item, overwrite: bool) -> Result<()>;

    /// Apply attribute changes to the item at `key`, creating it if missing.
    fn update_item(&self, table: &str, key: &Item, updates: &[AttributeUpdate]) -> Result<()>;

    /// Delete the item at `key`, returning it if it existed.
    fn delete_item(&self, table: &str, key: &Item) -> Result<Option<Item>>;

    fn query(&self, table: &str, request: &QueryRequest) -> Result<ItemStream<'_>>;

    fn query_count(&self, table: &str, request: &QueryRequest) -> Result<usize> {
        let mut count = 0;
        for item in self.query(table, request)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn scan(&self, table: &str, request: &ScanRequest) -> Result<ItemStream<'_>>;

    /// Apply up to [`crate::types::BATCH_WRITE_LIMIT`] operations as one flush.
    fn write_batch(&self, table: &str, ops: Vec<WriteOp>) -> Result<()>;

    /// Atomically add `delta` to a numeric attribute and return the new value.
    fn increment(&self, table: &str, key: &Item, field: &str, delta: &Value) -> Result<Value>;
}

/// Block until `describe_table` reports the table as active.
pub fn wait_table_active<S: Store + ?Sized>(store: &S, table: &str) -> Result<()> {
    loop {
        let description = store.describe_table(table)?;
        if description.status == TableStatus::Active {
            return Ok(());
        }
        debug!(table, status = ?description.status, "waiting for table to become active");
        thread::sleep(store.config().poll_interval());
    }
}

impl<S: Store + ?Sized> Store for &S {
    fn config(&self) -> &StoreConfig {
        (**self).config()
    }

    fn is_local(&self) -> bool {
        (**self).is_local()
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        (**self).table_exists(table)
    }

    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        (**self).create_table(schema)
    }

    fn describe_table(&self, table: &str) -> Result<TableDescription> {
        (**self).describe_table(table)
    }

    fn update_table_capacity(&self, table: &str, capacity: &Capacity) -> Result<()> {
        (**self).update_table_capacity(table, capacity)
    }

    fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        (**self).get_item(table, key)
    }

    fn put_item(&self, table: &str, item: Item, overwrite: bool) -> Result<()> {
        (**self).put_item(table, item, overwrite)
    }

    fn update_item(&self, table: &str, key: &Item, updates: &[AttributeUpdate]) -> Result<()> {
        (**self).update_item(table, key, updates)
    }

    fn delete_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        (**self).delete_item(table, key)
    }

    fn query(&self, table: &str, request: &QueryRequest) -> Result<ItemStream<'_>> {
        (**self).query(table, request)
    }

    fn query_count(&self, table: &str, request: &QueryRequest) -> Result<usize> {
        (**self).query_count(table, request)
    }

    fn scan(&self, table: &str, request: &ScanRequest) -> Result<ItemStream<'_>> {
        (**self).scan(table, request)
    }

    fn write_batch(&self, table: &str, ops: Vec<WriteOp>) -> Result<()> {
        (**self).write_batch(table, ops)
    }

    fn increment(&self, table: &str, key: &Item, field: &str, delta: &Value) -> Result<Value> {
        (**self).increment(table, key, field, delta)
    }
}
