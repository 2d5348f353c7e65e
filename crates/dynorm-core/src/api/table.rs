//! Table facade: binds an [`Entity`] type to a table on a [`Store`].

use std::marker::PhantomData;

use serde_json::Value;
use tracing::{debug, info};

use super::key_utils::{
    encode_item_key, key_map, record_key_values, storable_fields, storable_value,
    validate_item_size,
};
use super::record::{Entity, Record};
use crate::error::{Error, InvalidKeys, QueryError, Result, StoreError};
use crate::store::filter::{Condition, Predicate};
use crate::store::{
    AttributeUpdate, ItemStream, QueryRequest, ScanRequest, Store, wait_table_active,
};
use crate::types::{Item, TableDescription, TableSchema};

/// Typed access to one table.
///
/// ```ignore
/// let stores = Table::<Store, _>::open(&db, store_schema())?;
/// let mut store = stores.get_or_create("STORE1", None)?;
/// store.city = "Portland".into();
/// stores.save(&mut store)?;
/// ```
pub struct Table<E: Entity, S: Store> {
    store: S,
    schema: TableSchema,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: Store> Table<E, S> {
    /// Bind to the table described by `schema`, creating it if the store
    /// does not have it yet.
    pub fn open(store: S, schema: TableSchema) -> Result<Self> {
        if !store.table_exists(&schema.name)? {
            info!(table = %schema.name, "table missing, creating");
            store.create_table(&schema)?;
            wait_table_active(&store, &schema.name)?;
        }
        Ok(Self {
            store,
            schema,
            _entity: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the record at the given keys.
    ///
    /// Empty keys (e.g. `get("", None)`) are reported as not found; other
    /// invalid keys fail with [`Error::InvalidKeys`].
    pub fn get(&self, hash: impl Into<Value>, range: Option<Value>) -> Result<Record<E>> {
        let hash: Value = hash.into();
        let key = self.lookup_key(Some(&hash), range.as_ref())?;
        self.get_by_key(&key, false)
    }

    /// Like [`Table::get`], but a missing item yields a new, unsaved record
    /// holding the keys and default values for every other field.
    pub fn get_or_create(&self, hash: impl Into<Value>, range: Option<Value>) -> Result<Record<E>> {
        let hash: Value = hash.into();
        let key = self.lookup_key(Some(&hash), range.as_ref())?;
        self.get_by_key(&key, true)
    }

    /// Like [`Table::get`], with not-found mapped to `None`.
    pub fn find(&self, hash: impl Into<Value>, range: Option<Value>) -> Result<Option<Record<E>>> {
        match self.get(hash, range) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist a record.
    ///
    /// A record loaded from the store gets a partial update: changed storable
    /// fields are written and fields that became empty are removed; other
    /// stored attributes are left alone. A new record is written whole.
    /// Either way the record is marked as loaded afterwards.
    pub fn save(&self, record: &mut Record<E>) -> Result<()> {
        let fields = record.get_dict()?;
        let (hash, range) = record_key_values(&self.schema.key_schema, &fields);
        let key = self.key_for(hash, range)?;

        let snapshot = match record.stored_item() {
            Some(stored) => {
                let updates = self.partial_updates(stored, &fields);
                let mut snapshot = stored.clone();
                if !updates.is_empty() {
                    debug!(table = %self.schema.name, changes = updates.len(), "partial save");
                    self.store.update_item(&self.schema.name, &key, &updates)?;
                    apply_updates(&mut snapshot, &updates);
                }
                snapshot
            }
            None => {
                let item = storable_fields(&fields);
                debug!(table = %self.schema.name, "full save");
                self.store.put_item(&self.schema.name, item.clone(), true)?;
                item
            }
        };
        record.mark_loaded(snapshot);
        Ok(())
    }

    /// Delete the record at the given keys and return it.
    pub fn delete(&self, hash: impl Into<Value>, range: Option<Value>) -> Result<Record<E>> {
        let hash: Value = hash.into();
        let key = self.key_for(Some(&hash), range.as_ref())?;
        match self.store.delete_item(&self.schema.name, &key)? {
            Some(item) => {
                debug!(table = %self.schema.name, "deleted item");
                let mut record: Record<E> = Record::from_stored(item)?;
                record.mark_new();
                Ok(record)
            }
            None => Err(Error::not_found(&self.schema.name)),
        }
    }

    /// Run a query.
    ///
    /// The request needs an `eq` key condition on the table's hash key, or on
    /// the named index's hash key.
    pub fn query(&self, request: &QueryRequest) -> Result<Records<'_, E>> {
        self.check_query(request)?;
        Ok(Records::new(self.store.query(&self.schema.name, request)?))
    }

    /// Number of items a query would return.
    pub fn query_count(&self, request: &QueryRequest) -> Result<usize> {
        self.check_query(request)?;
        self.store.query_count(&self.schema.name, request)
    }

    /// Scan the whole table, keeping items that satisfy every filter.
    pub fn scan(&self, request: &ScanRequest) -> Result<Records<'_, E>> {
        Ok(Records::new(self.store.scan(&self.schema.name, request)?))
    }

    /// Atomically add `delta` to a numeric field at the backend and return
    /// the new value. Records already in memory are not updated. Key
    /// attributes cannot be counters.
    pub fn update_counter(
        &self,
        hash: impl Into<Value>,
        range: Option<Value>,
        field: &str,
        delta: impl Into<Value>,
    ) -> Result<Value> {
        if self.schema.key_schema.is_key(field) {
            return Err(StoreError::KeyAttribute(field.to_string()).into());
        }
        let hash: Value = hash.into();
        let key = self.key_for(Some(&hash), range.as_ref())?;
        self.store
            .increment(&self.schema.name, &key, field, &delta.into())
    }

    pub fn describe(&self) -> Result<TableDescription> {
        self.store.describe_table(&self.schema.name)
    }

    /// Copy every item of this table into `target`.
    ///
    /// An item whose key already exists in `target` fails the copy unless
    /// `update` is set, in which case it is replaced. `transform` may edit
    /// each item before it is written. Returns the number of items copied.
    pub fn copy_to<T: Entity, S2: Store>(
        &self,
        target: &Table<T, S2>,
        update: bool,
        mut transform: impl FnMut(&mut Item),
    ) -> Result<usize> {
        let items = self.store.scan(&self.schema.name, &ScanRequest::new())?;
        let mut copied = 0;
        for item in items {
            let mut item = item?;
            let (hash, range) = record_key_values(&target.schema.key_schema, &item);
            let key = target.key_for(hash, range)?;
            if !update && target.store.get_item(&target.schema.name, &key)?.is_some() {
                return Err(StoreError::ItemExists {
                    table: target.schema.name.clone(),
                    key: Value::Object(key),
                }
                .into());
            }
            transform(&mut item);
            target.store.put_item(&target.schema.name, item, true)?;
            copied += 1;
        }
        info!(from = %self.schema.name, to = %target.schema.name, copied, "copied table data");
        Ok(copied)
    }

    /// Validated key attribute map for the given values.
    pub(crate) fn key_for(
        &self,
        hash: Option<&Value>,
        range: Option<&Value>,
    ) -> std::result::Result<Item, InvalidKeys> {
        key_map(&self.schema.name, &self.schema.key_schema, hash, range)
    }

    /// [`Table::key_for`] with empty keys reported as not found.
    pub(crate) fn lookup_key(&self, hash: Option<&Value>, range: Option<&Value>) -> Result<Item> {
        self.key_for(hash, range).map_err(|e| {
            if e.is_empty_keys() {
                Error::not_found(&self.schema.name)
            } else {
                e.into()
            }
        })
    }

    /// Key attribute map of a record.
    pub(crate) fn record_key(&self, record: &mut Record<E>) -> Result<Item> {
        let fields = record.get_dict()?;
        let (hash, range) = record_key_values(&self.schema.key_schema, &fields);
        Ok(self.key_for(hash, range)?)
    }

    /// Whole storable item for a record, after validating its keys and size.
    pub(crate) fn full_item(&self, record: &mut Record<E>) -> Result<Item> {
        let fields = record.get_dict()?;
        let (hash, range) = record_key_values(&self.schema.key_schema, &fields);
        self.key_for(hash, range)?;
        let item = storable_fields(&fields);
        validate_item_size(&item)?;
        Ok(item)
    }

    /// Byte key identifying an item within this table.
    pub(crate) fn encoded_key(&self, key: &Item) -> Result<Vec<u8>> {
        encode_item_key(&self.schema.key_schema, key)
    }

    pub(crate) fn get_by_key(&self, key: &Item, create: bool) -> Result<Record<E>> {
        match self.store.get_item(&self.schema.name, key)? {
            Some(item) => Record::from_stored(item),
            None if create => self.new_record(key),
            None => Err(Error::not_found(&self.schema.name)),
        }
    }

    /// Unsaved record holding only the key attributes.
    pub(crate) fn new_record(&self, key: &Item) -> Result<Record<E>> {
        Record::from_fields(key.clone())
    }

    fn partial_updates(&self, stored: &Item, fields: &Item) -> Vec<AttributeUpdate> {
        fields
            .iter()
            .filter(|(name, _)| !self.schema.key_schema.is_key(name))
            .filter_map(|(name, value)| match storable_value(value) {
                Some(value) if stored.get(name) != Some(&value) => Some(AttributeUpdate::Put {
                    name: name.clone(),
                    value,
                }),
                Some(_) => None,
                None if stored.contains_key(name) => {
                    Some(AttributeUpdate::Remove { name: name.clone() })
                }
                None => None,
            })
            .collect()
    }

    fn check_query(&self, request: &QueryRequest) -> Result<()> {
        let (table, hash_key) = match &request.index {
            Some(index) => {
                let definition =
                    self.schema
                        .index(index)
                        .ok_or_else(|| StoreError::IndexNotFound {
                            table: self.schema.name.clone(),
                            index: index.clone(),
                        })?;
                (index.as_str(), definition.key_schema.hash_name())
            }
            None => (self.schema.name.as_str(), self.schema.key_schema.hash_name()),
        };
        check_hash_condition(table, hash_key, &request.key_conditions)
    }
}

/// Require an `eq` condition on `hash_key`.
fn check_hash_condition(table: &str, hash_key: &str, conditions: &[Predicate]) -> Result<()> {
    let mut found = false;
    for predicate in conditions.iter().filter(|p| p.field == hash_key) {
        if !matches!(predicate.condition, Condition::Eq(_)) {
            return Err(QueryError::HashKeyOperator(hash_key.to_string()).into());
        }
        found = true;
    }
    if !found {
        return Err(QueryError::HashKeyRequired {
            table: table.to_string(),
            hash_key: hash_key.to_string(),
        }
        .into());
    }
    Ok(())
}

fn apply_updates(item: &mut Item, updates: &[AttributeUpdate]) {
    for update in updates {
        match update {
            AttributeUpdate::Put { name, value } => {
                item.insert(name.clone(), value.clone());
            }
            AttributeUpdate::Remove { name } => {
                item.remove(name);
            }
        }
    }
}

/// Lazy sequence of records produced by a query or scan.
pub struct Records<'a, E> {
    items: ItemStream<'a>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E> Records<'a, E> {
    fn new(items: ItemStream<'a>) -> Self {
        Self {
            items,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Iterator for Records<'_, E> {
    type Item = Result<Record<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(|item| Record::from_stored(item?))
    }
}
