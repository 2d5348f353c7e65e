//! Schema-validated records.
//!
//! An [`Entity`] is a plain serde struct whose serialized field map is the
//! declared schema. [`Record`] wraps one entity instance together with the
//! bookkeeping the table facade needs to choose between a full write and a
//! partial update.

use std::ops::{Deref, DerefMut};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::types::Item;

/// How a record treats field names it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Only the fields of the serialized default value may be set.
    Strict,
    /// Any field may be set.
    Open,
}

/// A type that can be stored as a record.
///
/// For [`SchemaMode::Strict`] entities, the declared fields are the keys of
/// `serde_json::to_value(Self::default())`, so every field must serialize
/// (no `skip_serializing_if`). Fields whose names start with `_` are private:
/// they live on the entity but are never exported or persisted.
pub trait Entity: Serialize + DeserializeOwned + Default + Clone {
    /// Name used in error messages.
    const NAME: &'static str;

    const SCHEMA: SchemaMode = SchemaMode::Strict;

    /// Normalize or validate derived fields.
    ///
    /// Runs on construction, before every persist and before every export.
    fn check_data(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One entity instance plus its persistence state.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<E: Entity> {
    entity: E,
    /// Attributes as last read from or written to the store. `Some` marks the
    /// record as loaded, which makes the next save a partial update.
    loaded: Option<Item>,
}

impl<E: Entity> Record<E> {
    /// Wrap an entity built in code.
    pub fn new(mut entity: E) -> Result<Self> {
        entity.check_data()?;
        Ok(Self {
            entity,
            loaded: None,
        })
    }

    /// Build a record from named field values; undeclared names fail.
    pub fn from_fields(fields: Item) -> Result<Self> {
        let mut record = Self {
            entity: E::default(),
            loaded: None,
        };
        record.merge(fields, true)?;
        record.entity.check_data()?;
        Ok(record)
    }

    /// Build a record from a stored item. Attributes the entity does not
    /// declare are ignored.
    pub(crate) fn from_stored(item: Item) -> Result<Self> {
        let mut record = Self {
            entity: E::default(),
            loaded: None,
        };
        record.merge(item.clone(), false)?;
        record.entity.check_data()?;
        record.loaded = Some(item);
        Ok(record)
    }

    /// Merge `fields` into the record; undeclared names fail and leave the
    /// record unchanged.
    pub fn update_data(&mut self, fields: Item) -> Result<()> {
        self.merge(fields, true)
    }

    /// Merge `fields` into the record, skipping undeclared names.
    pub fn update_data_safe(&mut self, fields: Item) -> Result<()> {
        self.merge(fields, false)
    }

    /// Set a single field.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let mut fields = Item::new();
        fields.insert(field.to_string(), value.into());
        self.merge(fields, true)
    }

    /// Current value of a field, `None` if the record has no such field.
    pub fn get(&self, field: &str) -> Result<Option<Value>> {
        Ok(self.fields()?.remove(field))
    }

    /// Export the record as a plain field map without private fields.
    ///
    /// Runs [`Entity::check_data`] first so exported and persisted data agree.
    pub fn get_dict(&mut self) -> Result<Item> {
        self.get_dict_excluding(&[])
    }

    /// Like [`Record::get_dict`], also dropping the named fields.
    pub fn get_dict_excluding(&mut self, exclude: &[&str]) -> Result<Item> {
        self.entity.check_data()?;
        let mut fields = self.fields()?;
        fields.retain(|name, _| !name.starts_with('_') && !exclude.contains(&name.as_str()));
        Ok(fields)
    }

    /// Whether the record was read from (or partially written to) the store.
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    pub(crate) fn stored_item(&self) -> Option<&Item> {
        self.loaded.as_ref()
    }

    pub(crate) fn mark_loaded(&mut self, item: Item) {
        self.loaded = Some(item);
    }

    /// Forget the stored state, so the next save is a full write.
    pub(crate) fn mark_new(&mut self) {
        self.loaded = None;
    }

    fn fields(&self) -> Result<Item> {
        to_field_map::<E>(&self.entity)
    }

    fn merge(&mut self, fields: Item, strict: bool) -> Result<()> {
        let mut current = self.fields()?;
        for (name, value) in fields {
            if E::SCHEMA == SchemaMode::Strict && !current.contains_key(&name) {
                if strict {
                    return Err(SchemaError::UndeclaredField {
                        record: E::NAME,
                        field: name,
                        value,
                    }
                    .into());
                }
                continue;
            }
            current.insert(name, value);
        }
        self.entity = serde_json::from_value(Value::Object(current)).map_err(SchemaError::from)?;
        Ok(())
    }
}

impl<E: Entity> Deref for Record<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E: Entity> DerefMut for Record<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}

fn to_field_map<E: Entity>(entity: &E) -> Result<Item> {
    match serde_json::to_value(entity).map_err(SchemaError::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(SchemaError::NotAFieldMap { record: E::NAME }.into()),
    }
}

/// An open-schema entity: any field name is accepted.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DynamicRecord(pub Item);

impl Entity for DynamicRecord {
    const NAME: &'static str = "DynamicRecord";
    const SCHEMA: SchemaMode = SchemaMode::Open;
}

impl Deref for DynamicRecord {
    type Target = Item;

    fn deref(&self) -> &Item {
        &self.0
    }
}

impl DerefMut for DynamicRecord {
    fn deref_mut(&mut self) -> &mut Item {
        &mut self.0
    }
}
