//! GenAI attribute extraction
//!
//! Works on the flat `key -> value` map built from a span's `attributes[]`.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value as JsonValue};

use crate::domain::events::TokenUsage;
use crate::utils::json::json_as_u64;

pub const PROMPT_PREFIX: &str = "gen_ai.prompt.";
pub const COMPLETION_PREFIX: &str = "gen_ai.completion.";
pub const UNKNOWN_MODEL: &str = "unknown-model";

/// Vendor prefixes removed from metadata keys.
const VENDOR_PREFIXES: &[&str] = &["gen_ai.", "genAI.", "openai."];

/// Model attributes in resolution order.
const MODEL_KEYS: &[&str] = &[
    "gen_ai.request.model",
    "gen_ai.response.model",
    "llm.request.model",
];

const PROMPT_TOKEN_KEYS: &[&str] = &[
    "gen_ai.usage.prompt_tokens",
    "gen_ai.usage.input_tokens",
    "llm.usage.prompt_tokens",
];

const COMPLETION_TOKEN_KEYS: &[&str] = &[
    "gen_ai.usage.completion_tokens",
    "gen_ai.usage.output_tokens",
    "llm.usage.completion_tokens",
];

// ============================================================================
// ANY VALUE (JSON ENCODING)
// ============================================================================

/// Convert an OTLP/JSON `attributes[]` array into a plain map.
///
/// Entries without a string `key` are skipped.
pub fn attrs_to_map(attributes: &[JsonValue]) -> Map<String, JsonValue> {
    attributes
        .iter()
        .filter_map(|kv| {
            let key = kv.get("key")?.as_str()?;
            let value = kv.get("value").map(any_value_to_json).unwrap_or(JsonValue::Null);
            Some((key.to_string(), value))
        })
        .collect()
}

/// Unwrap one JSON-encoded `AnyValue`.
///
/// Values that are not wrapped in a typed union are passed through unchanged.
pub fn any_value_to_json(value: &JsonValue) -> JsonValue {
    let JsonValue::Object(map) = value else {
        return value.clone();
    };

    if let Some(v) = map.get("stringValue") {
        return v.clone();
    }
    if let Some(v) = map.get("boolValue") {
        return v.clone();
    }
    if let Some(v) = map.get("intValue") {
        return int_value(v);
    }
    if let Some(v) = map.get("doubleValue") {
        return match v {
            JsonValue::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or_else(|| v.clone()),
            other => other.clone(),
        };
    }
    if let Some(v) = map.get("bytesValue") {
        return bytes_value(v);
    }
    if let Some(v) = map.get("arrayValue") {
        let items = v
            .get("values")
            .and_then(JsonValue::as_array)
            .map(|vals| vals.iter().map(any_value_to_json).collect())
            .unwrap_or_default();
        return JsonValue::Array(items);
    }
    if let Some(v) = map.get("kvlistValue") {
        let kvs = v
            .get("values")
            .and_then(JsonValue::as_array)
            .map(|vals| attrs_to_map(vals))
            .unwrap_or_default();
        return JsonValue::Object(kvs);
    }
    if map.is_empty() {
        return JsonValue::Null;
    }
    value.clone()
}

/// 64-bit ints arrive as numbers, decimal strings or `{high, low}` halves.
fn int_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| value.clone()),
        JsonValue::Object(_) => match split_long(value) {
            Some(bits) => JsonValue::from(bits as i64),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Reassemble a protobufjs `{high, low}` long into its 64-bit pattern.
pub fn split_long(value: &JsonValue) -> Option<u64> {
    let high = value.get("high")?.as_i64()?;
    let low = value.get("low")?.as_i64()?;
    Some(((high as u32 as u64) << 32) | (low as u32 as u64))
}

/// Bytes arrive base64-encoded, or as a serialized Node `Buffer`.
fn bytes_value(value: &JsonValue) -> JsonValue {
    match byte_array(value) {
        Some(bytes) => JsonValue::String(BASE64.encode(bytes)),
        None => value.clone(),
    }
}

/// Read a `{type: "Buffer", data: [...]}` object or a plain number array.
pub fn byte_array(value: &JsonValue) -> Option<Vec<u8>> {
    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => map.get("data")?.as_array()?,
        _ => return None,
    };
    items
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

// ============================================================================
// MESSAGES
// ============================================================================

/// Rebuild ordered messages from indexed keys such as `gen_ai.prompt.0.role`.
///
/// Groups by numeric index in ascending order and ignores `finish_reason`.
/// Returns `None` when no indexed key exists under `prefix`.
pub fn build_messages(prefix: &str, attrs: &Map<String, JsonValue>) -> Option<Vec<JsonValue>> {
    let mut grouped: BTreeMap<usize, Map<String, JsonValue>> = BTreeMap::new();

    for (key, value) in attrs {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        let Some((index, field)) = rest.split_once('.') else {
            continue;
        };
        let Ok(index) = index.parse::<usize>() else {
            continue;
        };
        if field == "finish_reason" {
            continue;
        }
        grouped
            .entry(index)
            .or_default()
            .insert(field.to_string(), value.clone());
    }

    if grouped.is_empty() {
        return None;
    }
    Some(grouped.into_values().map(JsonValue::Object).collect())
}

// ============================================================================
// METADATA
// ============================================================================

/// Flatten span attributes into display metadata.
///
/// Vendor prefixes are stripped, keys already captured as messages, model or
/// usage are dropped, and each remaining key collapses to its last segment.
pub fn omit_keys(attrs: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    let mut out = Map::new();
    for (key, value) in attrs {
        if key == "llm.request.model" || key.starts_with("llm.usage.") {
            continue;
        }
        let stripped = VENDOR_PREFIXES
            .iter()
            .find_map(|p| key.strip_prefix(p))
            .unwrap_or(key);
        if is_redundant(stripped) {
            continue;
        }
        let short = stripped.rsplit('.').next().unwrap_or(stripped);
        out.insert(short.to_string(), value.clone());
    }
    out
}

fn is_redundant(key: &str) -> bool {
    if matches!(key, "request.model" | "response.model") || key.starts_with("usage.") {
        return true;
    }
    ["prompt.", "completion."].iter().any(|p| {
        key.strip_prefix(p)
            .and_then(|rest| rest.split('.').next())
            .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
    })
}

// ============================================================================
// MODEL & USAGE
// ============================================================================

/// Model attribute by precedence, without the span-name fallback.
pub fn model_attribute(attrs: &Map<String, JsonValue>) -> Option<String> {
    MODEL_KEYS
        .iter()
        .find_map(|k| attrs.get(*k).and_then(JsonValue::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Model name: model attributes, then the span name, then `unknown-model`.
pub fn resolve_model(attrs: &Map<String, JsonValue>, span_name: Option<&str>) -> String {
    model_attribute(attrs)
        .or_else(|| span_name.filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string())
}

/// Token usage with `gen_ai.usage.*` taking precedence over `llm.usage.*`.
pub fn resolve_usage(attrs: &Map<String, JsonValue>) -> Option<TokenUsage> {
    let count = |keys: &[&str]| keys.iter().find_map(|k| attrs.get(*k).and_then(json_as_u64));
    TokenUsage::from_counts(count(PROMPT_TOKEN_KEYS), count(COMPLETION_TOKEN_KEYS))
}

/// Whether the attributes describe a model call.
pub fn has_genai_attributes(attrs: &Map<String, JsonValue>) -> bool {
    model_attribute(attrs).is_some()
        || attrs
            .keys()
            .any(|k| k.starts_with("gen_ai.") || k.starts_with("llm."))
}
