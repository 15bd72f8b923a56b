//! JSON utility functions

use serde_json::{Map, Value as JsonValue};

/// Convert a snake_case or kebab-case key to camelCase.
///
/// Keys without `_` or `-` are returned unchanged, so keys that are already
/// camelCase pass through. Empty segments (leading, trailing or doubled
/// separators) are dropped.
pub fn to_camel_case(key: &str) -> String {
    if !key.contains(['_', '-']) {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    for segment in key.split(['_', '-']).filter(|s| !s.is_empty()) {
        if out.is_empty() {
            out.push_str(segment);
            continue;
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Recursively rewrite every object key to camelCase.
///
/// Walks arrays and objects depth-first; primitives are returned as-is.
pub fn camelize_keys(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let converted: Map<String, JsonValue> = map
                .into_iter()
                .map(|(k, v)| (to_camel_case(&k), camelize_keys(v)))
                .collect();
            JsonValue::Object(converted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(camelize_keys).collect()),
        other => other,
    }
}

/// Read a JSON value as an unsigned count.
///
/// Accepts non-negative integers, integral floats and numeric strings.
pub fn json_as_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Treat `null` as absent.
pub fn non_null(value: Option<JsonValue>) -> Option<JsonValue> {
    value.filter(|v| !v.is_null())
}
