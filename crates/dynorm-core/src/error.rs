//! Error types for all dynorm operations.

use serde_json::Value;
use thiserror::Error;

/// Top-level error type for dynorm operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    InvalidKeys(#[from] InvalidKeys),

    #[error("item not found in table '{table}'")]
    NotFound { table: String },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl Error {
    pub fn not_found(table: impl Into<String>) -> Self {
        Error::NotFound {
            table: table.into(),
        }
    }

    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("record {record} doesn't have '{field}' attribute, can not set it to {value}")]
    UndeclaredField {
        record: &'static str,
        field: String,
        value: Value,
    },

    #[error("record {record} rejected its data: {message}")]
    InvalidData {
        record: &'static str,
        message: String,
    },

    #[error("record {record} must serialize to a field map")]
    NotAFieldMap { record: &'static str },

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hash / range key values that cannot address an item.
///
/// When both values are absent (or not storable) the error reports
/// [`InvalidKeys::is_empty_keys`], which lookups downgrade to
/// [`Error::NotFound`].
#[derive(Debug, Error)]
#[error(
    "hash / range keys for table '{table}' are invalid or empty: {}",
    describe_keys(.hash_key, .hash, .range_key, .range)
)]
pub struct InvalidKeys {
    pub table: String,
    pub hash_key: String,
    pub range_key: Option<String>,
    pub hash: Option<Value>,
    pub range: Option<Value>,
}

impl InvalidKeys {
    pub fn is_empty_keys(&self) -> bool {
        self.hash.is_none() && self.range.is_none()
    }
}

fn describe_keys(
    hash_key: &str,
    hash: &Option<Value>,
    range_key: &Option<String>,
    range: &Option<Value>,
) -> String {
    let show = |v: &Option<Value>| v.as_ref().map_or("None".to_string(), Value::to_string);
    format!(
        "{{'{hash_key}': {}, '{}': {}}}",
        show(hash),
        range_key.as_deref().unwrap_or("None"),
        show(range)
    )
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    #[error("malformed constraint '{0}'")]
    MalformedConstraint(String),

    #[error("hash key '{hash_key}' is required for query to '{table}'")]
    HashKeyRequired { table: String, hash_key: String },

    #[error("only the eq operator is allowed for the hash key '{0}'")]
    HashKeyOperator(String),

    #[error("can't search by '{0}', only hash/range keys are allowed")]
    NotKeyField(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("index '{index}' not found on table '{table}'")]
    IndexNotFound { table: String, index: String },

    #[error("item already exists in '{table}': {key}")]
    ItemExists { table: String, key: Value },

    #[error("missing key attribute: {0}")]
    MissingKeyAttribute(String),

    #[error("key type mismatch for attribute '{name}': expected {expected:?}")]
    KeyTypeMismatch {
        name: String,
        expected: crate::types::KeyType,
    },

    #[error("key attribute '{0}' cannot be modified in place")]
    KeyAttribute(String),

    #[error("counter attribute '{0}' does not exist")]
    CounterMissing(String),

    #[error("counter attribute '{0}' is not a number")]
    CounterNotNumeric(String),

    #[error("batch of {actual} operations exceeds the limit of {max}")]
    BatchTooLarge { max: usize, actual: usize },

    #[error("capacity limit exceeded for table '{0}'")]
    LimitExceeded(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("NaN is not a valid key value")]
    NaN,

    #[error("item exceeds maximum size of {max} bytes (got {actual})")]
    ItemTooLarge { max: usize, actual: usize },

    #[error("MessagePack serialization error: {0}")]
    MessagePack(#[from] rmp_serde::encode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_keys_message() {
        let err = InvalidKeys {
            table: "store".to_string(),
            hash_key: "store_id".to_string(),
            range_key: None,
            hash: None,
            range: None,
        };
        assert!(err.is_empty_keys());
        assert_eq!(
            err.to_string(),
            "hash / range keys for table 'store' are invalid or empty: \
             {'store_id': None, 'None': None}"
        );
    }

    #[test]
    fn test_invalid_keys_not_empty() {
        let err = InvalidKeys {
            table: "visit".to_string(),
            hash_key: "customer_id".to_string(),
            range_key: Some("ts".to_string()),
            hash: Some(json!("C1")),
            range: None,
        };
        assert!(!err.is_empty_keys());
        assert!(err.to_string().contains("'customer_id': \"C1\""));
        assert!(err.to_string().contains("'ts': None"));
    }

    #[test]
    fn test_not_found_helper() {
        let err = Error::not_found("store");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "item not found in table 'store'");
        let err: Error = QueryError::UnsupportedOperator("contains".into()).into();
        assert!(!err.is_not_found());
    }
}
