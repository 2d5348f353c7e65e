//! Order-preserving byte encodings for key values.
//!
//! The in-memory engine and the cache both address items by the bytes
//! produced here, so partitions and range rows iterate in key order.

pub mod composite;
pub mod number;

/// A key value that can be encoded for byte-ordered comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    String(String),
    Number(f64),
    Binary(Vec<u8>),
}
