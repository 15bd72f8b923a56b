//! Span to event conversion

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::attrs::{
    self, COMPLETION_PREFIX, PROMPT_PREFIX, attrs_to_map, build_messages, byte_array, split_long,
};
use crate::domain::events::{ErrorInfo, Event, EventType};

const NANOS_PER_MILLI: u128 = 1_000_000;
const UNKNOWN_ERROR: &str = "Unknown error";

/// Which event type a span produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Flat model-call span.
    Llm,
    /// Node of a nested trace subtree.
    Chain,
}

impl SpanKind {
    fn event_type(self) -> EventType {
        match self {
            Self::Llm => EventType::Llm,
            Self::Chain => EventType::Chain,
        }
    }

    /// Pick the kind from span attributes.
    pub fn detect(attrs: &Map<String, JsonValue>) -> Self {
        if attrs::has_genai_attributes(attrs) {
            Self::Llm
        } else {
            Self::Chain
        }
    }
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// Read an OTEL nanosecond timestamp as an integer.
///
/// Accepts numbers, decimal strings and `{high, low}` split longs.
pub fn nanos_from_json(value: &JsonValue) -> Option<u128> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .map(u128::from)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u128)),
        JsonValue::String(s) => s.trim().parse::<u128>().ok(),
        JsonValue::Object(_) => split_long(value).map(u128::from),
        _ => None,
    }
}

/// Nanoseconds since epoch to an instant with millisecond precision.
///
/// Falls back to now when the value is absent or out of range.
pub fn ns_to_datetime(nanos: Option<u128>) -> DateTime<Utc> {
    nanos
        .and_then(|ns| i64::try_from(ns / NANOS_PER_MILLI).ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Decode a span/trace id from its JSON encodings.
///
/// Handles serialized `Buffer`s, byte arrays, hex strings (OTLP/JSON) and
/// base64 strings (protobufjs). Empty ids decode to `None`.
pub fn decode_id_bytes(value: &JsonValue) -> Option<Vec<u8>> {
    let bytes = match value {
        JsonValue::String(s) => {
            let s = s.trim();
            let is_hex = matches!(s.len(), 16 | 32) && s.bytes().all(|b| b.is_ascii_hexdigit());
            if is_hex {
                hex::decode(s).ok()?
            } else {
                BASE64.decode(s).ok()?
            }
        }
        other => byte_array(other)?,
    };
    (!bytes.is_empty()).then_some(bytes)
}

/// Map raw id bytes onto a UUID string.
///
/// The hex encoding is left-padded with zeros to 32 digits (8-byte span ids)
/// and grouped 8-4-4-4-12. No hashing: span ids are already unique.
pub fn buf_to_uuid(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let hex = format!("{:0>32}", hex::encode(bytes));
    let hex = &hex[..32];
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

fn parent_uuid(bytes: Option<&[u8]>) -> Option<String> {
    bytes
        .filter(|b| b.iter().any(|byte| *byte != 0))
        .and_then(buf_to_uuid)
}

// ============================================================================
// SPAN RECORD
// ============================================================================

/// Encoding-independent view of one span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub name: Option<String>,
    pub attributes: Map<String, JsonValue>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status_code: StatusCode,
    pub status_message: Option<String>,
    pub span_id: Option<Vec<u8>>,
    pub parent_span_id: Option<Vec<u8>>,
}

impl SpanRecord {
    /// Read a (camelCased) JSON span. Missing pieces degrade to defaults.
    pub fn from_json(span: &JsonValue) -> Self {
        let attributes = span
            .get("attributes")
            .and_then(JsonValue::as_array)
            .map(|a| attrs_to_map(a))
            .unwrap_or_default();
        let status = span.get("status");

        Self {
            name: span
                .get("name")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            attributes,
            start: ns_to_datetime(span.get("startTimeUnixNano").and_then(nanos_from_json)),
            end: ns_to_datetime(span.get("endTimeUnixNano").and_then(nanos_from_json)),
            status_code: status
                .and_then(|s| s.get("code"))
                .map(status_code_from_json)
                .unwrap_or(StatusCode::Unset),
            status_message: status
                .and_then(|s| s.get("message"))
                .and_then(JsonValue::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            span_id: span.get("spanId").and_then(decode_id_bytes),
            parent_span_id: span.get("parentSpanId").and_then(decode_id_bytes),
        }
    }

    /// Build the start event and the end (or error) event for this span.
    ///
    /// Both share one run id. A span without an id gets a fresh random one.
    /// An error status with a missing or empty message is reported as
    /// "Unknown error"; an empty string never reaches the stored error.
    pub fn into_events(self, kind: SpanKind) -> [Event; 2] {
        let run_id = self
            .span_id
            .as_deref()
            .and_then(buf_to_uuid)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let parent_run_id = parent_uuid(self.parent_span_id.as_deref());

        let name = match kind {
            SpanKind::Llm => attrs::resolve_model(&self.attributes, self.name.as_deref()),
            SpanKind::Chain => match self.name.as_deref().filter(|n| !n.is_empty()) {
                Some(n) => n.to_string(),
                None => attrs::resolve_model(&self.attributes, None),
            },
        };
        let metadata = JsonValue::Object(attrs::omit_keys(&self.attributes));
        let event_type = kind.event_type();

        let mut start = Event::new(event_type, self.start);
        start.event = Some("start".to_string());
        start.run_id = Some(run_id.clone());
        start.parent_run_id = parent_run_id.clone();
        start.name = Some(name.clone());
        start.input = build_messages(PROMPT_PREFIX, &self.attributes).map(JsonValue::Array);
        start.metadata = Some(metadata.clone());

        let mut end = Event::new(event_type, self.end);
        end.run_id = Some(run_id);
        end.parent_run_id = parent_run_id;
        end.name = Some(name);
        end.metadata = Some(metadata);

        if self.status_code == StatusCode::Error {
            end.event = Some("error".to_string());
            end.error = Some(ErrorInfo::new(
                self.status_message.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ));
        } else {
            end.event = Some("end".to_string());
            end.output = build_messages(COMPLETION_PREFIX, &self.attributes).map(JsonValue::Array);
            end.tokens_usage = attrs::resolve_usage(&self.attributes);
        }

        [start, end]
    }
}

fn status_code_from_json(value: &JsonValue) -> StatusCode {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|c| i32::try_from(c).ok())
            .and_then(|c| StatusCode::try_from(c).ok())
            .unwrap_or(StatusCode::Unset),
        JsonValue::String(s) => StatusCode::from_str_name(s)
            .or_else(|| StatusCode::from_str_name(&format!("STATUS_CODE_{}", s.to_uppercase())))
            .unwrap_or(StatusCode::Unset),
        _ => StatusCode::Unset,
    }
}
