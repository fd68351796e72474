//! Encoder traits for BSON-to-wire conversion
//!
//! The dispatch over BSON types lives in the provided method of
//! [`ExtendedTypeEncoder`]; implementors decide how each extended type is
//! represented on the wire.

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, DateTime, Decimal128, Document, oid::ObjectId};
use serde_json::{Map, Number, Value};

use super::helpers;

/// Core trait for encoding BSON values into wire JSON
pub trait ExtendedTypeEncoder {
    fn encode_int64(&self, n: i64) -> Value;
    fn encode_decimal128(&self, d: &Decimal128) -> Value;
    fn encode_object_id(&self, oid: &ObjectId) -> Value;
    fn encode_binary(&self, bin: &Binary) -> Value;
    fn encode_datetime(&self, dt: &DateTime) -> Value;

    /// Encode a document, preserving key order.
    fn encode_document(&self, doc: &Document) -> Value {
        let map: Map<String, Value> = doc
            .iter()
            .map(|(k, v)| (k.clone(), self.encode(v)))
            .collect();
        Value::Object(map)
    }

    /// Encode any BSON value (provided implementation)
    fn encode(&self, value: &Bson) -> Value {
        match value {
            Bson::String(s) => Value::String(s.clone()),
            Bson::Int32(n) => Value::Number((*n).into()),
            Bson::Int64(n) => self.encode_int64(*n),
            Bson::Double(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Bson::Boolean(b) => Value::Bool(*b),
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::ObjectId(oid) => self.encode_object_id(oid),
            Bson::DateTime(dt) => self.encode_datetime(dt),
            Bson::Decimal128(d) => self.encode_decimal128(d),
            Bson::Array(arr) => Value::Array(arr.iter().map(|v| self.encode(v)).collect()),
            Bson::Document(doc) => self.encode_document(doc),
            Bson::Binary(bin) => self.encode_binary(bin),
            other => other.clone().into_relaxed_extjson(),
        }
    }
}

/// Encoder producing the representation the service expects.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireEncoder;

impl ExtendedTypeEncoder for WireEncoder {
    fn encode_int64(&self, n: i64) -> Value {
        Value::Number(n.into())
    }

    fn encode_decimal128(&self, d: &Decimal128) -> Value {
        helpers::decimal128_to_f64(d)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    fn encode_object_id(&self, oid: &ObjectId) -> Value {
        Value::String(oid.to_hex())
    }

    fn encode_binary(&self, bin: &Binary) -> Value {
        match bin.subtype {
            BinarySubtype::Uuid | BinarySubtype::UuidOld => {
                Value::String(helpers::uuid_string(&bin.bytes))
            }
            subtype => serde_json::json!({
                "$binary": {
                    "base64": helpers::bytes_to_base64(&bin.bytes),
                    "subType": format!("{:02x}", helpers::binary_subtype_to_u8(subtype)),
                }
            }),
        }
    }

    fn encode_datetime(&self, dt: &DateTime) -> Value {
        serde_json::json!({ "$date": dt.timestamp_millis() })
    }
}
