//! Shared fixtures: entity types, table schemas and a prefixed in-memory store.

#![allow(dead_code)]

use dynorm_core::api::Entity;
use dynorm_core::error::{Result, SchemaError};
use dynorm_core::store::MemoryStore;
use dynorm_core::types::{IndexDefinition, KeyDefinition, KeySchema, TableSchema, Throughput};
use dynorm_core::StoreConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; `RUST_LOG=dynorm_core=debug` shows store traffic.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn db() -> MemoryStore {
    init_tracing();
    MemoryStore::new(StoreConfig::default().with_table_prefix("zz_unit_test_"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: String,
    pub company_id: String,
    pub city: String,
    pub country: String,
    pub tags: Vec<String>,
}

impl Entity for Store {
    const NAME: &'static str = "Store";

    fn check_data(&mut self) -> Result<()> {
        self.tags = self
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        Ok(())
    }
}

pub fn store_schema() -> TableSchema {
    TableSchema::new("store", KeyDefinition::string("store_id"))
        .throughput(3, 3)
        .global_index(IndexDefinition::new(
            "StoreCompanyIndex",
            KeySchema::with_range(
                KeyDefinition::string("company_id"),
                KeyDefinition::string("store_id"),
            ),
            Throughput::new(3, 3),
        ))
}

pub fn store(id: &str, company: &str, city: &str) -> Store {
    Store {
        store_id: id.into(),
        company_id: company.into(),
        city: city.into(),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub company_id: String,
    pub name: String,
}

impl Entity for Company {
    const NAME: &'static str = "Company";
}

pub fn company_schema() -> TableSchema {
    TableSchema::new("company", KeyDefinition::string("company_id")).throughput(3, 3)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub thanks_count: i64,
}

impl Entity for Customer {
    const NAME: &'static str = "Customer";

    fn check_data(&mut self) -> Result<()> {
        if !self.gender.is_empty() && self.gender != "male" && self.gender != "female" {
            return Err(SchemaError::InvalidData {
                record: Self::NAME,
                message: format!("unknown gender: {}", self.gender),
            }
            .into());
        }
        Ok(())
    }
}

pub fn customer_schema() -> TableSchema {
    TableSchema::new("customer", KeyDefinition::string("customer_id")).throughput(20, 4)
}

/// Visit of a customer to a store; the hash key is derived from both ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerVisit {
    pub customer_store: String,
    pub customer_id: String,
    pub store_id: String,
    pub visits: i64,
}

impl CustomerVisit {
    pub fn hash_for(customer_id: &str, store_id: &str) -> String {
        format!("{customer_id}|{store_id}")
    }
}

impl Entity for CustomerVisit {
    const NAME: &'static str = "CustomerVisit";

    fn check_data(&mut self) -> Result<()> {
        if !self.customer_id.is_empty() && !self.store_id.is_empty() {
            self.customer_store = Self::hash_for(&self.customer_id, &self.store_id);
        }
        Ok(())
    }
}

pub fn visit_schema() -> TableSchema {
    TableSchema::new("customer_visit", KeyDefinition::string("customer_store")).throughput(3, 1)
}

/// Schema-less events keyed by source and sequence number.
pub fn event_schema() -> TableSchema {
    TableSchema::new("event", KeyDefinition::string("source")).range_key(KeyDefinition::number("seq"))
}
