//! Public API: records, the table facade, the record cache and capacity scopes.

pub mod cache;
pub mod key_utils;
pub mod record;
pub mod table;
pub mod throughput;

pub use cache::{CacheEntry, CacheStats, CachedTable, SaveReport};
pub use record::{DynamicRecord, Entity, Record, SchemaMode};
pub use table::{Records, Table};
pub use throughput::{ThroughputGuard, ThroughputScope};
