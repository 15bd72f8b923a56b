//! OpenTelemetry span translation
//!
//! Converts GenAI spans into canonical events. Every span yields exactly two
//! events, a `start` and an `end` (or `error`), sharing one run id derived from
//! the raw span id bytes. Parent span ids become `parentRunId`.
//!
//! Input arrives either as a decoded protobuf [`ExportTraceServiceRequest`] or
//! as loose JSON of any wrapping depth. Both go through [`SpanRecord`], so the
//! same span produces the same events regardless of encoding.

mod attrs;
mod convert;
mod proto;
mod walk;

#[cfg(test)]
mod tests;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use serde_json::Value as JsonValue;

use crate::domain::events::Event;
use crate::utils::json::camelize_keys;

pub use convert::{SpanKind, SpanRecord};
use walk::{OtelNode, dig_for_span, flatten_spans};

/// Translate a single span of unknown wrapping depth.
///
/// When no span with `attributes` can be found the payload itself is treated
/// as the span, producing events with empty metadata.
pub fn span_to_events(payload: &JsonValue, kind: SpanKind) -> Vec<Event> {
    let payload = camelize_keys(payload.clone());
    let span = dig_for_span(&payload);
    SpanRecord::from_json(span).into_events(kind).into()
}

/// Translate every span in a JSON export payload.
///
/// The span kind is detected per span. An export wrapper (`resourceSpans`,
/// `scopeSpans`, `spans` or a list) without leaf spans yields nothing, like
/// the protobuf path. Any other non-empty object is read as a single span.
pub fn trace_to_events(payload: &JsonValue) -> Vec<Event> {
    let camelized = camelize_keys(payload.clone());
    let spans = flatten_spans(&camelized);

    if spans.is_empty() {
        // Export wrappers without leaf spans are empty exports, not a span.
        return match OtelNode::classify(&camelized) {
            OtelNode::Unknown if camelized.as_object().is_some_and(|m| !m.is_empty()) => {
                let record = SpanRecord::from_json(&camelized);
                let kind = SpanKind::detect(&record.attributes);
                record.into_events(kind).into()
            }
            _ => Vec::new(),
        };
    }

    spans
        .into_iter()
        .flat_map(|span| {
            let record = SpanRecord::from_json(span);
            let kind = SpanKind::detect(&record.attributes);
            record.into_events(kind)
        })
        .collect()
}

/// Translate every span in a decoded protobuf export request.
pub fn request_to_events(request: &ExportTraceServiceRequest) -> Vec<Event> {
    proto::request_spans(request)
        .flat_map(|span| {
            let record = SpanRecord::from_proto(span);
            let kind = SpanKind::detect(&record.attributes);
            record.into_events(kind)
        })
        .collect()
}
