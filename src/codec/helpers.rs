//! Helper functions for wire value conversion
//!
//! Small, pure conversions shared by the encoder and the decoder.

use base64::Engine;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Decimal128};
use serde_json::Value;

/// Largest canonical coefficient of a decimal128 (34 nines).
const MAX_DECIMAL_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999;
const DECIMAL_EXPONENT_BIAS: i32 = 6176;

/// Convert a decimal128 to the nearest `f64`.
///
/// Decodes the binary integer decimal layout directly.
///
/// # Returns
/// `None` for NaN, `Some(±inf)` for infinities, the rounded value otherwise.
/// Non-canonical encodings decode as zero.
pub fn decimal128_to_f64(d: &Decimal128) -> Option<f64> {
    let bytes = d.bytes();
    let mut low_bytes = [0u8; 8];
    let mut high_bytes = [0u8; 8];
    low_bytes.copy_from_slice(&bytes[..8]);
    high_bytes.copy_from_slice(&bytes[8..]);
    let low = u64::from_le_bytes(low_bytes);
    let high = u64::from_le_bytes(high_bytes);

    let negative = high >> 63 == 1;
    let sign = if negative { -1.0 } else { 1.0 };

    if (high >> 61) & 0b11 == 0b11 {
        return match (high >> 58) & 0b1_1111 {
            0b1_1111 => None,
            0b1_1110 => Some(sign * f64::INFINITY),
            // Large-coefficient form always exceeds the canonical range.
            _ => Some(sign * 0.0),
        };
    }

    let exponent = ((high >> 49) & 0x3fff) as i32 - DECIMAL_EXPONENT_BIAS;
    let coefficient = (u128::from(high & 0x1_ffff_ffff_ffff) << 64) | u128::from(low);
    if coefficient > MAX_DECIMAL_COEFFICIENT {
        return Some(sign * 0.0);
    }

    // Let the float parser do the rounding: exact to the nearest f64.
    let magnitude: f64 = format!("{coefficient}e{exponent}").parse().ok()?;
    Some(sign * magnitude)
}

/// Render UUID bytes in hyphenated form.
///
/// Anything that is not exactly 16 bytes falls back to plain hex.
pub fn uuid_string(bytes: &[u8]) -> String {
    match uuid::Uuid::from_slice(bytes) {
        Ok(id) => id.hyphenated().to_string(),
        Err(_) => hex::encode(bytes),
    }
}

/// Parse a hyphenated (or simple) UUID string into a UUID binary.
pub fn parse_uuid_binary(s: &str) -> Option<Bson> {
    let id = uuid::Uuid::parse_str(s).ok()?;
    Some(Bson::Binary(Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.as_bytes().to_vec(),
    }))
}

/// Extract epoch milliseconds from a `$date` payload.
///
/// # Arguments
/// * `value` - a number, a `{"$numberLong": "..."}` wrapper or an RFC 3339 string
///
/// # Returns
/// Milliseconds since the epoch, or `None` if the payload is not a date
pub fn parse_date_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        Value::Object(map) => map
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        _ => None,
    }
}

/// Encode bytes as standard Base64
pub fn bytes_to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode standard Base64, `None` on malformed input
pub fn base64_to_bytes(s: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD.decode(s).ok()
}

/// Convert BinarySubtype to u8 number
///
/// # Arguments
/// * `subtype` - BSON Binary subtype
///
/// # Returns
/// Numeric representation of the subtype
pub fn binary_subtype_to_u8(subtype: BinarySubtype) -> u8 {
    match subtype {
        BinarySubtype::Generic => 0,
        BinarySubtype::Function => 1,
        BinarySubtype::BinaryOld => 2,
        BinarySubtype::UuidOld => 3,
        BinarySubtype::Uuid => 4,
        BinarySubtype::Md5 => 5,
        BinarySubtype::Encrypted => 6,
        BinarySubtype::Column => 7,
        BinarySubtype::Sensitive => 8,
        BinarySubtype::UserDefined(n) => n,
        _ => 0,
    }
}
