//! Core types: key definitions, table schemas, capacities, and table descriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The store's representation of one record: a flat attribute name → value map.
pub type Item = Map<String, Value>;

/// Maximum item size in bytes (400KB, matching DynamoDB).
pub const MAX_ITEM_SIZE: usize = 400 * 1024;

/// Number of queued operations after which a batch writer flushes.
pub const BATCH_WRITE_LIMIT: usize = 25;

/// The type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    String,
    Number,
    Binary,
}

/// A key attribute definition (name + type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyDefinition {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, KeyType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, KeyType::Number)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, KeyType::Binary)
    }
}

/// Ordered key fields: the hash key, then an optional range key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub hash: KeyDefinition,
    pub range: Option<KeyDefinition>,
}

impl KeySchema {
    pub fn new(hash: KeyDefinition) -> Self {
        Self { hash, range: None }
    }

    pub fn with_range(hash: KeyDefinition, range: KeyDefinition) -> Self {
        Self {
            hash,
            range: Some(range),
        }
    }

    pub fn hash_name(&self) -> &str {
        &self.hash.name
    }

    pub fn range_name(&self) -> Option<&str> {
        self.range.as_ref().map(|r| r.name.as_str())
    }

    /// Whether `field` is one of the key attributes.
    pub fn is_key(&self, field: &str) -> bool {
        self.hash_name() == field || self.range_name() == Some(field)
    }
}

/// Provisioned read/write capacity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    pub read: u64,
    pub write: u64,
}

impl Throughput {
    pub fn new(read: u64, write: u64) -> Self {
        Self { read, write }
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self { read: 1, write: 1 }
    }
}

/// A global secondary index: its own key fields and capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub key_schema: KeySchema,
    pub throughput: Throughput,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, key_schema: KeySchema, throughput: Throughput) -> Self {
        Self {
            name: name.into(),
            key_schema,
            throughput,
        }
    }
}

/// Schema definition for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub key_schema: KeySchema,
    pub throughput: Throughput,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, hash: KeyDefinition) -> Self {
        Self {
            name: name.into(),
            key_schema: KeySchema::new(hash),
            throughput: Throughput::default(),
            indexes: Vec::new(),
        }
    }

    /// Set the range key attribute.
    pub fn range_key(mut self, range: KeyDefinition) -> Self {
        self.key_schema.range = Some(range);
        self
    }

    /// Set the provisioned capacity of the table itself.
    pub fn throughput(mut self, read: u64, write: u64) -> Self {
        self.throughput = Throughput::new(read, write);
        self
    }

    /// Add a global secondary index.
    pub fn global_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

/// Lifecycle state reported by `describe_table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Updating,
    Active,
}

/// Table-level and per-index capacities.
///
/// Used both as a snapshot of the current configuration and as a change
/// request: a `None` table capacity leaves the table's own capacity alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub table: Option<Throughput>,
    #[serde(default)]
    pub indexes: BTreeMap<String, Throughput>,
}

impl Capacity {
    pub fn table(read: u64, write: u64) -> Self {
        Self {
            table: Some(Throughput::new(read, write)),
            indexes: BTreeMap::new(),
        }
    }

    pub fn with_index(mut self, name: impl Into<String>, read: u64, write: u64) -> Self {
        self.indexes.insert(name.into(), Throughput::new(read, write));
        self
    }
}

/// Synthesized table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    /// Physical name, including the store's table prefix.
    pub name: String,
    pub status: TableStatus,
    pub key_schema: KeySchema,
    pub throughput: Throughput,
    pub index_throughputs: BTreeMap<String, Throughput>,
}

impl TableDescription {
    /// Current capacities in the shape accepted by `update_table_capacity`.
    pub fn capacity(&self) -> Capacity {
        Capacity {
            table: Some(self.throughput),
            indexes: self.index_throughputs.clone(),
        }
    }
}
