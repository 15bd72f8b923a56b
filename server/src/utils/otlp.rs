//! OTLP utility functions
//!
//! Conversions from typed OTLP protobuf values into plain JSON, shared by the
//! protobuf ingestion path and its tests.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use serde_json::{Map, Value as JsonValue};

/// Convert AnyValue to JSON value (preserves native types).
///
/// Bytes are rendered as base64, matching the OTLP/JSON encoding of `bytesValue`.
pub fn any_value_to_json(value: &AnyValue) -> JsonValue {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => JsonValue::String(s.clone()),
        Some(any_value::Value::BoolValue(b)) => JsonValue::Bool(*b),
        Some(any_value::Value::IntValue(i)) => JsonValue::from(*i),
        Some(any_value::Value::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(any_value::Value::ArrayValue(arr)) => {
            JsonValue::Array(arr.values.iter().map(any_value_to_json).collect())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => build_attributes_map(&kvlist.values).into(),
        Some(any_value::Value::BytesValue(b)) => JsonValue::String(BASE64.encode(b)),
        None => JsonValue::Null,
    }
}

/// Build a key → value map from raw KeyValue attributes (preserves types).
///
/// Attributes without a value are skipped.
pub fn build_attributes_map(attrs: &[KeyValue]) -> Map<String, JsonValue> {
    attrs
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| (kv.key.clone(), any_value_to_json(v)))
        })
        .collect()
}
