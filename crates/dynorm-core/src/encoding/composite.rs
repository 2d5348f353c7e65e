use crate::error::EncodingError;

use super::KeyValue;

/// Type tag constants for composite key encoding.
pub const TAG_STRING: u8 = 0x01;
pub const TAG_NUMBER: u8 = 0x02;
pub const TAG_BINARY: u8 = 0x03;

/// Append `data` using the escaped-terminator scheme.
///
/// Every `0x00` becomes `0x00 escape`, and `0x00 0x00` terminates the value,
/// so a shorter value sorts before any value it prefixes.
fn push_escaped(out: &mut Vec<u8>, data: &[u8], escape: u8) {
    for &b in data {
        out.push(b);
        if b == 0x00 {
            out.push(escape);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

/// Append one tagged key value.
fn push_key_value(out: &mut Vec<u8>, kv: &KeyValue) -> Result<(), EncodingError> {
    match kv {
        KeyValue::String(s) => {
            out.push(TAG_STRING);
            push_escaped(out, s.as_bytes(), 0xFF);
        }
        KeyValue::Number(n) => {
            out.push(TAG_NUMBER);
            out.extend_from_slice(&super::number::encode_number(*n)?);
        }
        KeyValue::Binary(b) => {
            out.push(TAG_BINARY);
            push_escaped(out, b, 0x01);
        }
    }
    Ok(())
}

/// Encode a single key value (a partition or a range row).
pub fn encode_key(kv: &KeyValue) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    push_key_value(&mut out, kv)?;
    Ok(out)
}

/// Encode a composite key (hash + optional range).
///
/// Format: `[tag][hash]` or `[tag][hash][tag][range]`.
pub fn encode_composite(
    hash: &KeyValue,
    range: Option<&KeyValue>,
) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    push_key_value(&mut out, hash)?;
    if let Some(range) = range {
        push_key_value(&mut out, range)?;
    }
    Ok(out)
}
