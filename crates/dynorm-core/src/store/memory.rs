//! In-memory store that emulates the remote backend's semantics.
//!
//! Items live in a partitioned index: first by the encoded hash key, then by
//! the encoded range key (empty for hash-only tables). Both levels are
//! ordered maps, so scans and queries return items in key order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::{Number, Value};
use tracing::{debug, info};

use super::filter::{Predicate, matches_all};
use super::{AttributeUpdate, ItemStream, QueryRequest, ScanRequest, Store, WriteOp};
use crate::api::key_utils::{
    extract_key, json_to_key_value, storable_fields, storable_value, validate_item_size,
};
use crate::config::StoreConfig;
use crate::encoding::composite::encode_key;
use crate::error::{Error, QueryError, Result, StoreError};
use crate::types::{
    BATCH_WRITE_LIMIT, Capacity, Item, KeyDefinition, KeySchema, TableDescription, TableSchema,
    TableStatus, Throughput,
};

type Partition = BTreeMap<Vec<u8>, Item>;

struct TableData {
    schema: TableSchema,
    throughput: Throughput,
    index_throughputs: BTreeMap<String, Throughput>,
    capacity_updates: u32,
    partitions: BTreeMap<Vec<u8>, Partition>,
}

impl TableData {
    fn new(schema: TableSchema) -> Self {
        let index_throughputs = schema
            .indexes
            .iter()
            .map(|idx| (idx.name.clone(), idx.throughput))
            .collect();
        Self {
            throughput: schema.throughput,
            index_throughputs,
            capacity_updates: 0,
            partitions: BTreeMap::new(),
            schema,
        }
    }

    fn key_schema(&self) -> &KeySchema {
        &self.schema.key_schema
    }

    fn items(&self) -> impl Iterator<Item = &Item> {
        self.partitions.values().flat_map(|p| p.values())
    }

    fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    fn insert(&mut self, (hash, range): (Vec<u8>, Vec<u8>), item: Item) {
        self.partitions.entry(hash).or_default().insert(range, item);
    }

    fn remove(&mut self, (hash, range): &(Vec<u8>, Vec<u8>)) -> Option<Item> {
        let partition = self.partitions.get_mut(hash)?;
        let removed = partition.remove(range);
        if partition.is_empty() {
            self.partitions.remove(hash);
        }
        removed
    }

    fn get(&self, (hash, range): &(Vec<u8>, Vec<u8>)) -> Option<&Item> {
        self.partitions.get(hash)?.get(range)
    }
}

/// Snapshot of the operation counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub gets: u64,
    pub puts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub queries: u64,
    pub scans: u64,
    pub batch_flushes: u64,
    pub increments: u64,
    pub capacity_updates: u64,
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    puts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    scans: AtomicU64,
    batch_flushes: AtomicU64,
    increments: AtomicU64,
    capacity_updates: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct MemoryInner {
    config: StoreConfig,
    tables: RwLock<HashMap<String, TableData>>,
    counters: Counters,
}

/// In-process [`Store`] backed by ordered maps.
///
/// Cheap to clone; clones share the same tables. Tables always report
/// [`TableStatus::Active`] and no throttling is simulated, except for the
/// optional capacity-change quota in [`StoreConfig::max_capacity_updates`].
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

/// An unprefixed local store.
impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default().with_local(true))
    }
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                config,
                tables: RwLock::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Drop every item of every table, keeping the table definitions.
    pub fn reset(&self) {
        let mut tables = self.inner.tables.write();
        for data in tables.values_mut() {
            data.partitions.clear();
        }
        debug!("memory store reset");
    }

    /// Physical names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of items stored in `table`.
    pub fn item_count(&self, table: &str) -> Result<usize> {
        let name = self.physical(table);
        let tables = self.inner.tables.read();
        Ok(lookup(&tables, &name)?.len())
    }

    pub fn stats(&self) -> StoreStats {
        let c = &self.inner.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StoreStats {
            gets: load(&c.gets),
            puts: load(&c.puts),
            updates: load(&c.updates),
            deletes: load(&c.deletes),
            queries: load(&c.queries),
            scans: load(&c.scans),
            batch_flushes: load(&c.batch_flushes),
            increments: load(&c.increments),
            capacity_updates: load(&c.capacity_updates),
        }
    }

    fn physical(&self, table: &str) -> String {
        self.inner.config.table_name(table)
    }
}

fn lookup<'a>(tables: &'a HashMap<String, TableData>, name: &str) -> Result<&'a TableData> {
    tables
        .get(name)
        .ok_or_else(|| StoreError::TableNotFound(name.to_string()).into())
}

fn lookup_mut<'a>(
    tables: &'a mut HashMap<String, TableData>,
    name: &str,
) -> Result<&'a mut TableData> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::TableNotFound(name.to_string()).into())
}

fn encode_attr(item: &Item, def: &KeyDefinition) -> Result<Vec<u8>> {
    Ok(encode_key(&extract_key(item, def)?)?)
}

/// Partition key and row key of `item`.
fn row_key(schema: &KeySchema, item: &Item) -> Result<(Vec<u8>, Vec<u8>)> {
    let hash = encode_attr(item, &schema.hash)?;
    let range = match &schema.range {
        Some(def) => encode_attr(item, def)?,
        None => Vec::new(),
    };
    Ok((hash, range))
}

/// Key attributes of `item`, as a map.
fn key_attrs(schema: &KeySchema, item: &Item) -> Item {
    item.iter()
        .filter(|(name, _)| schema.is_key(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Hash partition a query without an index is restricted to.
///
/// Key conditions may only name key attributes and the hash key may only be
/// compared with `eq`.
fn query_partition(table: &str, schema: &KeySchema, conditions: &[Predicate]) -> Result<Value> {
    let mut hash_value = None;
    for predicate in conditions {
        if predicate.field == schema.hash.name {
            match &predicate.condition {
                super::Condition::Eq(value) => hash_value = Some(value.clone()),
                _ => return Err(QueryError::HashKeyOperator(predicate.field.clone()).into()),
            }
        } else if schema.range_name() != Some(predicate.field.as_str()) {
            return Err(QueryError::NotKeyField(predicate.field.clone()).into());
        }
    }
    hash_value.ok_or_else(|| {
        QueryError::HashKeyRequired {
            table: table.to_string(),
            hash_key: schema.hash.name.clone(),
        }
        .into()
    })
}

fn collect_limited<'a>(
    items: impl Iterator<Item = &'a Item>,
    predicates: &[&[Predicate]],
    limit: Option<usize>,
) -> Vec<Item> {
    items
        .filter(|item| predicates.iter().all(|p| matches_all(p, item)))
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

fn add_numbers(current: &Number, delta: &Number) -> Option<Number> {
    if let (Some(a), Some(b)) = (current.as_i64(), delta.as_i64())
        && let Some(sum) = a.checked_add(b)
    {
        return Some(Number::from(sum));
    }
    Number::from_f64(current.as_f64()? + delta.as_f64()?)
}

impl Store for MemoryStore {
    fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.inner.tables.read().contains_key(&self.physical(table)))
    }

    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let name = self.physical(&schema.name);
        let mut tables = self.inner.tables.write();
        if tables.contains_key(&name) {
            debug!(table = %name, "table already exists");
            return Ok(());
        }
        info!(table = %name, indexes = schema.indexes.len(), "creating table");
        tables.insert(name, TableData::new(schema.clone()));
        Ok(())
    }

    fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let name = self.physical(table);
        let tables = self.inner.tables.read();
        let data = lookup(&tables, &name)?;
        Ok(TableDescription {
            name,
            status: TableStatus::Active,
            key_schema: data.key_schema().clone(),
            throughput: data.throughput,
            index_throughputs: data.index_throughputs.clone(),
        })
    }

    fn update_table_capacity(&self, table: &str, capacity: &Capacity) -> Result<()> {
        let name = self.physical(table);
        let mut tables = self.inner.tables.write();
        let data = lookup_mut(&mut tables, &name)?;

        if let Some(max) = self.inner.config.max_capacity_updates
            && data.capacity_updates >= max
        {
            return Err(StoreError::LimitExceeded(name).into());
        }
        if let Some(index) = capacity
            .indexes
            .keys()
            .find(|index| data.schema.index(index).is_none())
        {
            return Err(StoreError::IndexNotFound {
                table: name,
                index: index.clone(),
            }
            .into());
        }

        if let Some(throughput) = capacity.table {
            data.throughput = throughput;
        }
        for (index, throughput) in &capacity.indexes {
            data.index_throughputs.insert(index.clone(), *throughput);
        }
        data.capacity_updates += 1;
        bump(&self.inner.counters.capacity_updates);
        info!(
            table = %name,
            read = data.throughput.read,
            write = data.throughput.write,
            indexes = capacity.indexes.len(),
            "updated table capacity"
        );
        Ok(())
    }

    fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        bump(&self.inner.counters.gets);
        let name = self.physical(table);
        let tables = self.inner.tables.read();
        let data = lookup(&tables, &name)?;
        let row = row_key(data.key_schema(), key)?;
        Ok(data.get(&row).cloned())
    }

    fn put_item(&self, table: &str, item: Item, overwrite: bool) -> Result<()> {
        bump(&self.inner.counters.puts);
        let name = self.physical(table);
        let item = storable_fields(&item);
        validate_item_size(&item)?;

        let mut tables = self.inner.tables.write();
        let data = lookup_mut(&mut tables, &name)?;
        let row = row_key(data.key_schema(), &item)?;
        if !overwrite && data.get(&row).is_some() {
            return Err(StoreError::ItemExists {
                table: name,
                key: Value::Object(key_attrs(data.key_schema(), &item)),
            }
            .into());
        }
        debug!(table = %name, "put item");
        data.insert(row, item);
        Ok(())
    }

    fn update_item(&self, table: &str, key: &Item, updates: &[AttributeUpdate]) -> Result<()> {
        bump(&self.inner.counters.updates);
        let name = self.physical(table);
        let mut tables = self.inner.tables.write();
        let data = lookup_mut(&mut tables, &name)?;
        let schema = data.key_schema().clone();
        let row = row_key(&schema, key)?;

        let mut item = data
            .get(&row)
            .cloned()
            .unwrap_or_else(|| key_attrs(&schema, key));
        for update in updates {
            match update {
                AttributeUpdate::Put { name, value } if !schema.is_key(name) => {
                    match storable_value(value) {
                        Some(value) => item.insert(name.clone(), value),
                        None => item.remove(name),
                    };
                }
                AttributeUpdate::Remove { name } if !schema.is_key(name) => {
                    item.remove(name);
                }
                _ => {}
            }
        }
        validate_item_size(&item)?;
        debug!(table = %name, changes = updates.len(), "updated item");
        data.insert(row, item);
        Ok(())
    }

    fn delete_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        bump(&self.inner.counters.deletes);
        let name = self.physical(table);
        let mut tables = self.inner.tables.write();
        let data = lookup_mut(&mut tables, &name)?;
        let row = row_key(data.key_schema(), key)?;
        Ok(data.remove(&row))
    }

    fn query(&self, table: &str, request: &QueryRequest) -> Result<ItemStream<'_>> {
        bump(&self.inner.counters.queries);
        let name = self.physical(table);
        let tables = self.inner.tables.read();
        let data = lookup(&tables, &name)?;
        let predicates = [request.key_conditions.as_slice(), request.filters.as_slice()];

        let items = if request.index.is_some() {
            // Index queries are evaluated over every partition.
            collect_limited(data.items(), &predicates, request.limit)
        } else {
            let schema = data.key_schema();
            let hash_value = query_partition(&name, schema, &request.key_conditions)?;
            let partition = json_to_key_value(&hash_value, schema.hash.key_type)
                .map(|kv| encode_key(&kv))
                .transpose()?
                .and_then(|hash| data.partitions.get(&hash));
            match partition {
                Some(partition) => collect_limited(partition.values(), &predicates, request.limit),
                None => Vec::new(),
            }
        };
        debug!(table = %name, index = ?request.index, results = items.len(), "query");
        Ok(Box::new(items.into_iter().map(Ok)))
    }

    fn scan(&self, table: &str, request: &ScanRequest) -> Result<ItemStream<'_>> {
        bump(&self.inner.counters.scans);
        let name = self.physical(table);
        let tables = self.inner.tables.read();
        let data = lookup(&tables, &name)?;
        let items = collect_limited(data.items(), &[request.filters.as_slice()], request.limit);
        debug!(table = %name, results = items.len(), "scan");
        Ok(Box::new(items.into_iter().map(Ok)))
    }

    fn write_batch(&self, table: &str, ops: Vec<WriteOp>) -> Result<()> {
        if ops.len() > BATCH_WRITE_LIMIT {
            return Err(StoreError::BatchTooLarge {
                max: BATCH_WRITE_LIMIT,
                actual: ops.len(),
            }
            .into());
        }
        bump(&self.inner.counters.batch_flushes);
        let name = self.physical(table);
        let mut tables = self.inner.tables.write();
        let data = lookup_mut(&mut tables, &name)?;

        // Resolve every key first so a bad operation rejects the whole flush.
        let mut prepared = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                WriteOp::Put(item) => {
                    let item = storable_fields(&item);
                    validate_item_size(&item)?;
                    prepared.push((row_key(data.key_schema(), &item)?, Some(item)));
                }
                WriteOp::Delete(key) => prepared.push((row_key(data.key_schema(), &key)?, None)),
            }
        }
        for (row, item) in prepared {
            match item {
                Some(item) => data.insert(row, item),
                None => {
                    data.remove(&row);
                }
            }
        }
        debug!(table = %name, "batch flushed");
        Ok(())
    }

    fn increment(&self, table: &str, key: &Item, field: &str, delta: &Value) -> Result<Value> {
        bump(&self.inner.counters.increments);
        let name = self.physical(table);
        let Value::Number(delta) = delta else {
            return Err(StoreError::CounterNotNumeric(field.to_string()).into());
        };

        let mut tables = self.inner.tables.write();
        let data = lookup_mut(&mut tables, &name)?;
        if data.key_schema().is_key(field) {
            return Err(StoreError::KeyAttribute(field.to_string()).into());
        }
        let row = row_key(data.key_schema(), key)?;
        let Some(item) = data
            .partitions
            .get_mut(&row.0)
            .and_then(|p| p.get_mut(&row.1))
        else {
            return Err(Error::not_found(name));
        };

        let current = match item.get(field) {
            None => return Err(StoreError::CounterMissing(field.to_string()).into()),
            Some(Value::Number(n)) => n,
            Some(_) => return Err(StoreError::CounterNotNumeric(field.to_string()).into()),
        };
        let updated = add_numbers(current, delta)
            .ok_or_else(|| StoreError::CounterNotNumeric(field.to_string()))?;
        item.insert(field.to_string(), Value::Number(updated.clone()));
        debug!(table = %name, field, value = %updated, "incremented counter");
        Ok(Value::Number(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexDefinition;
    use serde_json::json;

    fn item(value: Value) -> Item {
        value.as_object().unwrap().clone()
    }

    fn visits_schema() -> TableSchema {
        TableSchema::new("visit", KeyDefinition::string("customer_id"))
            .range_key(KeyDefinition::number("day"))
            .global_index(IndexDefinition::new(
                "VisitStoreIndex",
                KeySchema::new(KeyDefinition::string("store_id")),
                Throughput::new(2, 2),
            ))
    }

    fn store_with_visits() -> MemoryStore {
        let store = MemoryStore::default();
        store.create_table(&visits_schema()).unwrap();
        for (customer, day, store_id) in [
            ("C1", 1, "S1"),
            ("C1", 2, "S2"),
            ("C1", 3, "S1"),
            ("C2", 1, "S1"),
        ] {
            store
                .put_item(
                    "visit",
                    item(json!({"customer_id": customer, "day": day, "store_id": store_id})),
                    false,
                )
                .unwrap();
        }
        store
    }

    fn days(items: ItemStream<'_>) -> Vec<i64> {
        items
            .map(|i| i.unwrap()["day"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = MemoryStore::default();
        store.create_table(&visits_schema()).unwrap();
        store
            .put_item("visit", item(json!({"customer_id": "C1", "day": 1})), false)
            .unwrap();
        store.create_table(&visits_schema()).unwrap();
        assert_eq!(store.item_count("visit").unwrap(), 1);
        assert!(store.table_exists("visit").unwrap());
        assert!(!store.table_exists("other").unwrap());
    }

    #[test]
    fn test_table_prefix() {
        let store = MemoryStore::new(StoreConfig::default().with_table_prefix("zz_"));
        store.create_table(&visits_schema()).unwrap();
        assert_eq!(store.list_tables(), vec!["zz_visit".to_string()]);
        assert_eq!(store.describe_table("visit").unwrap().name, "zz_visit");
    }

    #[test]
    fn test_put_get_delete() {
        let store = store_with_visits();
        let key = item(json!({"customer_id": "C1", "day": 2}));
        let found = store.get_item("visit", &key).unwrap().unwrap();
        assert_eq!(found["store_id"], json!("S2"));

        let deleted = store.delete_item("visit", &key).unwrap();
        assert!(deleted.is_some());
        assert!(store.get_item("visit", &key).unwrap().is_none());
        assert!(store.delete_item("visit", &key).unwrap().is_none());
    }

    #[test]
    fn test_put_without_overwrite_rejects_existing() {
        let store = store_with_visits();
        let err = store
            .put_item("visit", item(json!({"customer_id": "C1", "day": 1})), false)
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::ItemExists { .. })));
        store
            .put_item("visit", item(json!({"customer_id": "C1", "day": 1})), true)
            .unwrap();
    }

    #[test]
    fn test_put_drops_unstorable_values() {
        let store = store_with_visits();
        store
            .put_item(
                "visit",
                item(json!({"customer_id": "C9", "day": 1, "note": "", "tags": [], "n": 0})),
                false,
            )
            .unwrap();
        let found = store
            .get_item("visit", &item(json!({"customer_id": "C9", "day": 1})))
            .unwrap()
            .unwrap();
        assert_eq!(
            Value::Object(found),
            json!({"customer_id": "C9", "day": 1, "n": 0})
        );
    }

    #[test]
    fn test_missing_table() {
        let store = MemoryStore::default();
        let err = store.get_item("nope", &Item::new()).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::TableNotFound(_))));
    }

    #[test]
    fn test_update_item_applies_changes() {
        let store = store_with_visits();
        let key = item(json!({"customer_id": "C1", "day": 1}));
        store
            .update_item(
                "visit",
                &key,
                &[
                    AttributeUpdate::Put {
                        name: "note".into(),
                        value: json!("hello"),
                    },
                    AttributeUpdate::Remove {
                        name: "store_id".into(),
                    },
                    AttributeUpdate::Put {
                        name: "day".into(),
                        value: json!(99),
                    },
                ],
            )
            .unwrap();
        let found = store.get_item("visit", &key).unwrap().unwrap();
        assert_eq!(
            Value::Object(found),
            json!({"customer_id": "C1", "day": 1, "note": "hello"})
        );
    }

    #[test]
    fn test_update_item_creates_missing() {
        let store = store_with_visits();
        let key = item(json!({"customer_id": "C5", "day": 1}));
        store
            .update_item(
                "visit",
                &key,
                &[AttributeUpdate::Put {
                    name: "store_id".into(),
                    value: json!("S3"),
                }],
            )
            .unwrap();
        let found = store.get_item("visit", &key).unwrap().unwrap();
        assert_eq!(found["store_id"], json!("S3"));
    }

    #[test]
    fn test_scan_all_and_filtered() {
        let store = store_with_visits();
        let all = store.scan("visit", &ScanRequest::new()).unwrap();
        assert_eq!(all.count(), 4);

        let req = ScanRequest::new().filter("store_id__eq", "S1").unwrap();
        assert_eq!(store.scan("visit", &req).unwrap().count(), 3);

        let req = ScanRequest::new().limit(2);
        assert_eq!(store.scan("visit", &req).unwrap().count(), 2);
    }

    #[test]
    fn test_query_partition_in_range_order() {
        let store = store_with_visits();
        let req = QueryRequest::new().key("customer_id__eq", "C1").unwrap();
        assert_eq!(days(store.query("visit", &req).unwrap()), vec![1, 2, 3]);

        let req = QueryRequest::new()
            .key("customer_id__eq", "C1")
            .unwrap()
            .key("day__gte", 2)
            .unwrap();
        assert_eq!(days(store.query("visit", &req).unwrap()), vec![2, 3]);

        let req = QueryRequest::new()
            .key("customer_id__eq", "C1")
            .unwrap()
            .filter("store_id__eq", "S1")
            .unwrap();
        assert_eq!(days(store.query("visit", &req).unwrap()), vec![1, 3]);
    }

    #[test]
    fn test_query_unknown_partition_is_empty() {
        let store = store_with_visits();
        let req = QueryRequest::new().key("customer_id__eq", "C404").unwrap();
        assert_eq!(store.query("visit", &req).unwrap().count(), 0);
        assert_eq!(store.query_count("visit", &req).unwrap(), 0);
    }

    #[test]
    fn test_query_shape_errors() {
        let store = store_with_visits();

        let req = QueryRequest::new().key("day__eq", 1).unwrap();
        assert!(matches!(
            store.query("visit", &req).map(|_| ()),
            Err(Error::Query(QueryError::HashKeyRequired { .. }))
        ));

        let req = QueryRequest::new().key("customer_id__gt", "C1").unwrap();
        assert!(matches!(
            store.query("visit", &req).map(|_| ()),
            Err(Error::Query(QueryError::HashKeyOperator(_)))
        ));

        let req = QueryRequest::new()
            .key("customer_id__eq", "C1")
            .unwrap()
            .key("store_id__eq", "S1")
            .unwrap();
        assert!(matches!(
            store.query("visit", &req).map(|_| ()),
            Err(Error::Query(QueryError::NotKeyField(f))) if f == "store_id"
        ));
    }

    #[test]
    fn test_query_with_index_spans_partitions() {
        let store = store_with_visits();
        let req = QueryRequest::new()
            .key("store_id__eq", "S1")
            .unwrap()
            .index("VisitStoreIndex");
        assert_eq!(store.query_count("visit", &req).unwrap(), 3);
    }

    #[test]
    fn test_write_batch_limit() {
        let store = store_with_visits();
        let ops: Vec<WriteOp> = (0..26)
            .map(|day| WriteOp::Put(item(json!({"customer_id": "C7", "day": day}))))
            .collect();
        let err = store.write_batch("visit", ops).unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::BatchTooLarge { max: 25, actual: 26 })
        ));
        assert_eq!(store.stats().batch_flushes, 0);
    }

    #[test]
    fn test_write_batch_rejects_whole_flush_on_bad_key() {
        let store = store_with_visits();
        let ops = vec![
            WriteOp::Put(item(json!({"customer_id": "C7", "day": 1}))),
            WriteOp::Put(item(json!({"customer_id": "C7"}))),
        ];
        assert!(store.write_batch("visit", ops).is_err());
        assert_eq!(store.item_count("visit").unwrap(), 4);
    }

    #[test]
    fn test_increment() {
        let store = store_with_visits();
        let key = item(json!({"customer_id": "C1", "day": 1}));
        store
            .update_item(
                "visit",
                &key,
                &[AttributeUpdate::Put {
                    name: "count".into(),
                    value: json!(0),
                }],
            )
            .unwrap();
        assert_eq!(
            store.increment("visit", &key, "count", &json!(5)).unwrap(),
            json!(5)
        );
        assert_eq!(
            store.increment("visit", &key, "count", &json!(5)).unwrap(),
            json!(10)
        );
        assert_eq!(
            store.increment("visit", &key, "count", &json!(-1)).unwrap(),
            json!(9)
        );
        assert_eq!(
            store.increment("visit", &key, "count", &json!(0.5)).unwrap(),
            json!(9.5)
        );
    }

    #[test]
    fn test_increment_errors() {
        let store = store_with_visits();
        let key = item(json!({"customer_id": "C1", "day": 1}));
        assert!(matches!(
            store.increment("visit", &key, "count", &json!(1)),
            Err(Error::Store(StoreError::CounterMissing(_)))
        ));
        assert!(matches!(
            store.increment("visit", &key, "store_id", &json!(1)),
            Err(Error::Store(StoreError::CounterNotNumeric(_)))
        ));
        let missing = item(json!({"customer_id": "C1", "day": 50}));
        assert!(
            store
                .increment("visit", &missing, "count", &json!(1))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_default_store_is_local() {
        assert!(MemoryStore::default().is_local());
        assert!(!MemoryStore::new(StoreConfig::default()).is_local());
    }

    #[test]
    fn test_increment_rejects_key_attributes() {
        let store = store_with_visits();
        let key = item(json!({"customer_id": "C1", "day": 1}));
        assert!(matches!(
            store.increment("visit", &key, "day", &json!(5)),
            Err(Error::Store(StoreError::KeyAttribute(ref name))) if name == "day"
        ));
        assert!(store.get_item("visit", &key).unwrap().is_some());
        let moved = item(json!({"customer_id": "C1", "day": 6}));
        assert!(store.get_item("visit", &moved).unwrap().is_none());
    }

    #[test]
    fn test_capacity_updates_and_quota() {
        let store = MemoryStore::new(StoreConfig::default().with_max_capacity_updates(1));
        store.create_table(&visits_schema()).unwrap();

        let capacity = Capacity::table(10, 5).with_index("VisitStoreIndex", 3, 4);
        store.update_table_capacity("visit", &capacity).unwrap();
        let description = store.describe_table("visit").unwrap();
        assert_eq!(description.throughput, Throughput::new(10, 5));
        assert_eq!(
            description.index_throughputs["VisitStoreIndex"],
            Throughput::new(3, 4)
        );

        let err = store
            .update_table_capacity("visit", &Capacity::table(1, 1))
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::LimitExceeded(_))));
    }

    #[test]
    fn test_capacity_update_unknown_index() {
        let store = store_with_visits();
        let err = store
            .update_table_capacity("visit", &Capacity::default().with_index("Nope", 1, 1))
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::IndexNotFound { .. })));
    }

    #[test]
    fn test_reset_keeps_tables() {
        let store = store_with_visits();
        store.reset();
        assert_eq!(store.item_count("visit").unwrap(), 0);
        assert!(store.table_exists("visit").unwrap());
    }

    #[test]
    fn test_stats_count_operations() {
        let store = store_with_visits();
        let before = store.stats();
        store
            .get_item("visit", &item(json!({"customer_id": "C1", "day": 1})))
            .unwrap();
        store.scan("visit", &ScanRequest::new()).unwrap().count();
        let after = store.stats();
        assert_eq!(after.gets, before.gets + 1);
        assert_eq!(after.scans, before.scans + 1);
        assert_eq!(after.puts, 4);
    }
}
