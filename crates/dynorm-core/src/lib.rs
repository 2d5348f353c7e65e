//! # dynorm
//!
//! An object mapper over a hash/range keyed document store.
//!
//! Entities are plain serde structs. A [`api::Table`] binds an entity type
//! to a table on a [`store::Store`] and handles key validation, full and
//! partial saves, queries, scans and atomic counters. [`store::MemoryStore`]
//! is an in-process backend with the same query semantics, and
//! [`api::CachedTable`] adds a read-through, write-back record cache.
//!
//! ## Quick Start
//!
//! ```
//! use dynorm_core::api::{Entity, Record, Table};
//! use dynorm_core::store::{MemoryStore, ScanRequest};
//! use dynorm_core::types::{KeyDefinition, TableSchema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Store {
//!     store_id: String,
//!     city: String,
//! }
//!
//! impl Entity for Store {
//!     const NAME: &'static str = "Store";
//! }
//!
//! let db = MemoryStore::default();
//! let stores: Table<Store, _> =
//!     Table::open(&db, TableSchema::new("store", KeyDefinition::string("store_id"))).unwrap();
//!
//! let mut store = Record::new(Store { store_id: "STORE1".into(), city: "C1".into() }).unwrap();
//! stores.save(&mut store).unwrap();
//!
//! let found = stores.get("STORE1", None).unwrap();
//! assert_eq!(found.city, "C1");
//!
//! let in_c1 = ScanRequest::new().filter("city__eq", "C1").unwrap();
//! assert_eq!(stores.scan(&in_c1).unwrap().count(), 1);
//! assert!(stores.get("", None).unwrap_err().is_not_found());
//! ```

pub mod api;
pub mod config;
pub mod encoding;
pub mod error;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use error::{Error, Result};
