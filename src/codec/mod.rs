//! Wire codec for command and response documents
//!
//! In memory, documents are BSON. On the wire, the service speaks plain JSON
//! with a handful of extended-type conventions. This module converts between
//! the two:
//! - Encoding special-cases 64-bit integers, decimals, object ids,
//!   UUID-tagged binaries and dates
//! - Decoding understands the `$date`, `$oid`, `$uuid`, `$numberDecimal`,
//!   `$numberLong` and `$binary` wrappers the service may send back
//!
//! Both directions are pure functions with no state and no I/O.

mod converter;
mod helpers;

pub use converter::{ExtendedTypeEncoder, WireEncoder};
pub use helpers::{decimal128_to_f64, uuid_string};

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, DateTime, Document, oid::ObjectId};
use serde_json::{Map, Value};

/// Encode a single BSON value to its wire JSON form.
pub fn to_wire(value: &Bson) -> Value {
    WireEncoder.encode(value)
}

/// Encode a document to a wire JSON object.
pub fn document_to_wire(doc: &Document) -> Value {
    WireEncoder.encode_document(doc)
}

/// Serialize a command document to the wire string.
///
/// `pretty` produces indented output and is meant for diagnostics only.
pub fn serialize_command(command: &Document, pretty: bool) -> String {
    let value = document_to_wire(command);
    let out = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    // Serializing a `Value` cannot fail: all map keys are strings.
    out.unwrap_or_default()
}

/// Decode a response payload. Absent payloads stay absent.
pub fn deserialize(payload: Option<Value>) -> Option<Document> {
    payload.map(|value| match from_wire(&value) {
        Bson::Document(doc) => doc,
        other => {
            let mut doc = Document::new();
            doc.insert("value", other);
            doc
        }
    })
}

/// Decode a wire JSON value to BSON, interpreting extended-type wrappers.
pub fn from_wire(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => decode_number(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(from_wire).collect()),
        Value::Object(map) => decode_wrapper(map).unwrap_or_else(|| {
            Bson::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), from_wire(v)))
                    .collect(),
            )
        }),
    }
}

/// Whether two values are logically equal once put on the wire.
///
/// An `ObjectId` and its hex string compare equal, as do a UUID binary and
/// its hyphenated form: the service cannot tell them apart either.
pub fn same_wire_value(a: &Bson, b: &Bson) -> bool {
    to_wire(a) == to_wire(b)
}

/// Remove one entry equal to `value` (by wire form) from `pending`.
///
/// Returns whether an entry was found. Each pending entry confirms at most
/// one value.
pub fn take_matching(pending: &mut Vec<Bson>, value: &Bson) -> bool {
    match pending.iter().position(|p| same_wire_value(p, value)) {
        Some(index) => {
            pending.swap_remove(index);
            true
        }
        None => false,
    }
}

fn decode_number(n: &serde_json::Number) -> Bson {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        }
    } else {
        Bson::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Interpret single-key `$`-wrappers. Returns `None` for ordinary objects
/// and for wrappers whose payload does not parse.
fn decode_wrapper(map: &Map<String, Value>) -> Option<Bson> {
    if map.len() == 1 {
        let (key, inner) = map.iter().next()?;
        return match key.as_str() {
            "$date" => helpers::parse_date_millis(inner)
                .map(|ms| Bson::DateTime(DateTime::from_millis(ms))),
            "$oid" => inner
                .as_str()
                .and_then(|s| ObjectId::parse_str(s).ok())
                .map(Bson::ObjectId),
            "$uuid" => inner.as_str().and_then(helpers::parse_uuid_binary),
            "$numberDecimal" => inner
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .map(Bson::Double),
            "$numberLong" => inner
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .map(Bson::Int64),
            "$binary" => decode_binary(inner),
            _ => None,
        };
    }
    None
}

fn decode_binary(inner: &Value) -> Option<Bson> {
    let obj = inner.as_object()?;
    let bytes = helpers::base64_to_bytes(obj.get("base64")?.as_str()?)?;
    let subtype = obj
        .get("subType")
        .and_then(Value::as_str)
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .map(BinarySubtype::from)
        .unwrap_or(BinarySubtype::Generic);

    Some(Bson::Binary(Binary { subtype, bytes }))
}
