use crate::error::EncodingError;

/// Encode an f64 as 8 big-endian bytes whose `memcmp` order is numeric order.
///
/// NaN is rejected and -0.0 encodes like +0.0. Negative values have every
/// bit flipped; non-negative values have only the sign bit flipped.
pub fn encode_number(value: f64) -> Result<[u8; 8], EncodingError> {
    if value.is_nan() {
        return Err(EncodingError::NaN);
    }
    let value = if value == 0.0 { 0.0_f64 } else { value };

    let bits = value.to_bits();
    let ordered = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    Ok(ordered.to_be_bytes())
}
