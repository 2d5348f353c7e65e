//! Key derivation and the storability rule.
//!
//! Shared by the table facade (validating caller keys), the cache (deriving
//! its entry keys) and the in-memory engine (indexing stored items).

use serde_json::Value;

use crate::encoding::{KeyValue, composite};
use crate::error::{EncodingError, Error, InvalidKeys, StoreError};
use crate::types::{Item, KeyDefinition, KeySchema, KeyType, MAX_ITEM_SIZE};

/// Whether the backend can persist `value`.
///
/// Null, the empty string and empty collections are not storable; zero,
/// `0.0` and `false` are.
pub fn is_storable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// The storable part of `value`, recursing into nested maps.
///
/// A nested map that loses every attribute is itself dropped.
pub fn storable_value(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let nested = storable_fields(map);
            (!nested.is_empty()).then_some(Value::Object(nested))
        }
        other => is_storable(other).then(|| other.clone()),
    }
}

/// Copy of `item` without the attributes the backend cannot persist.
pub fn storable_fields(item: &Item) -> Item {
    item.iter()
        .filter_map(|(name, value)| storable_value(value).map(|v| (name.clone(), v)))
        .collect()
}

/// Validate item size and return the serialized length (MessagePack).
pub fn validate_item_size(item: &Item) -> Result<usize, Error> {
    let bytes = rmp_serde::to_vec(item).map_err(EncodingError::from)?;
    if bytes.len() > MAX_ITEM_SIZE {
        return Err(EncodingError::ItemTooLarge {
            max: MAX_ITEM_SIZE,
            actual: bytes.len(),
        }
        .into());
    }
    Ok(bytes.len())
}

/// A key value with JSON null treated as absent.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Convert a JSON value to a [`KeyValue`] of the expected type.
///
/// Binary keys are arrays of byte values. Returns `None` on a type mismatch
/// and for integers an `f64` cannot hold exactly.
pub fn json_to_key_value(val: &Value, key_type: KeyType) -> Option<KeyValue> {
    match key_type {
        KeyType::String => val.as_str().map(|s| KeyValue::String(s.to_string())),
        KeyType::Number => match val {
            Value::Number(n) => exact_f64(n).map(KeyValue::Number),
            _ => None,
        },
        KeyType::Binary => val
            .as_array()?
            .iter()
            .map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(KeyValue::Binary),
    }
}

/// Largest integer magnitude below which every integer is an exact `f64`.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

fn exact_f64(n: &serde_json::Number) -> Option<f64> {
    if let Some(i) = n.as_i64() {
        return (i.unsigned_abs() <= MAX_EXACT_INTEGER).then_some(i as f64);
    }
    if let Some(u) = n.as_u64() {
        return (u <= MAX_EXACT_INTEGER).then_some(u as f64);
    }
    n.as_f64()
}

/// Extract a key attribute from a stored item.
pub fn extract_key(item: &Item, key_def: &KeyDefinition) -> Result<KeyValue, Error> {
    let val = item
        .get(&key_def.name)
        .ok_or_else(|| StoreError::MissingKeyAttribute(key_def.name.clone()))?;
    json_to_key_value(val, key_def.key_type).ok_or_else(|| {
        StoreError::KeyTypeMismatch {
            name: key_def.name.clone(),
            expected: key_def.key_type,
        }
        .into()
    })
}

/// Encode the primary key of `item` (hash, then range if the schema has one).
pub fn encode_item_key(schema: &KeySchema, item: &Item) -> Result<Vec<u8>, Error> {
    let hash = extract_key(item, &schema.hash)?;
    let range = match &schema.range {
        Some(def) => Some(extract_key(item, def)?),
        None => None,
    };
    Ok(composite::encode_composite(&hash, range.as_ref())?)
}

/// Build the key attribute map for the given hash / range values.
///
/// Rejects a missing hash value, a missing range value on a table that has a
/// range key, a storable range value on a table that has none, values that
/// are not storable, and values of the wrong key type. A hash value that is
/// not storable is reported with both keys empty.
pub fn key_map(
    table: &str,
    schema: &KeySchema,
    hash: Option<&Value>,
    range: Option<&Value>,
) -> Result<Item, InvalidKeys> {
    let (hash, range) = (present(hash), present(range));
    let invalid = |hash: Option<&Value>, range: Option<&Value>| InvalidKeys {
        table: table.to_string(),
        hash_key: schema.hash.name.clone(),
        range_key: schema.range.as_ref().map(|r| r.name.clone()),
        hash: hash.cloned(),
        range: range.cloned(),
    };

    let Some(hash_val) = hash else {
        return Err(invalid(None, range));
    };
    let range_val = match (&schema.range, range) {
        (Some(_), None) => return Err(invalid(Some(hash_val), None)),
        (Some(_), Some(v)) => Some(v),
        (None, Some(v)) if is_storable(v) => return Err(invalid(Some(hash_val), Some(v))),
        (None, _) => None,
    };

    if !is_storable(hash_val) {
        return Err(invalid(None, None));
    }
    if let Some(r) = range_val
        && !is_storable(r)
    {
        return Err(invalid(Some(hash_val), None));
    }

    if json_to_key_value(hash_val, schema.hash.key_type).is_none() {
        return Err(invalid(Some(hash_val), range_val));
    }
    if let (Some(def), Some(r)) = (&schema.range, range_val)
        && json_to_key_value(r, def.key_type).is_none()
    {
        return Err(invalid(Some(hash_val), Some(r)));
    }

    let mut key = Item::new();
    key.insert(schema.hash.name.clone(), hash_val.clone());
    if let (Some(def), Some(r)) = (&schema.range, range_val) {
        key.insert(def.name.clone(), r.clone());
    }
    Ok(key)
}

/// Hash / range values as they appear in an exported field map.
pub fn record_key_values<'a>(
    schema: &KeySchema,
    fields: &'a Item,
) -> (Option<&'a Value>, Option<&'a Value>) {
    let hash = fields.get(&schema.hash.name);
    let range = schema.range.as_ref().and_then(|def| fields.get(&def.name));
    (hash, range)
}
