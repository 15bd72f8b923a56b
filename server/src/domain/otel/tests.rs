use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span, Status};
use serde_json::{Value as JsonValue, json};

use super::*;
use crate::domain::events::{EventType, TokenUsage};

// ============================================================================
// FIXTURES
// ============================================================================

const SPAN_ID_HEX: &str = "aabbccdd11223344";
const PARENT_ID_HEX: &str = "0102030405060708";
const START_NS: u64 = 1_700_000_000_000_000_000;
const END_NS: u64 = 1_700_000_001_500_000_000;

fn attr(key: &str, value: JsonValue) -> JsonValue {
    json!({"key": key, "value": value})
}

fn llm_span_json(status_code: i64, status_message: &str) -> JsonValue {
    json!({
        "name": "chat gpt-4o",
        "spanId": SPAN_ID_HEX,
        "parentSpanId": PARENT_ID_HEX,
        "startTimeUnixNano": START_NS.to_string(),
        "endTimeUnixNano": END_NS.to_string(),
        "status": {"code": status_code, "message": status_message},
        "attributes": [
            attr("gen_ai.request.model", json!({"stringValue": "gpt-4o"})),
            attr("gen_ai.prompt.0.role", json!({"stringValue": "user"})),
            attr("gen_ai.prompt.0.content", json!({"stringValue": "hello"})),
            attr("gen_ai.completion.0.role", json!({"stringValue": "assistant"})),
            attr("gen_ai.completion.0.content", json!({"stringValue": "hi there"})),
            attr("gen_ai.completion.0.finish_reason", json!({"stringValue": "stop"})),
            attr("gen_ai.usage.prompt_tokens", json!({"intValue": "5"})),
            attr("gen_ai.usage.completion_tokens", json!({"intValue": 3})),
            attr("gen_ai.custom.flag", json!({"boolValue": true}))
        ]
    })
}

fn wrap(spans: Vec<JsonValue>) -> JsonValue {
    json!({"resourceSpans": [{"scopeSpans": [{"spans": spans}]}]})
}

fn kv(key: &str, value: any_value::Value) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue { value: Some(value) }),
    }
}

fn string_kv(key: &str, value: &str) -> KeyValue {
    kv(key, any_value::Value::StringValue(value.to_string()))
}

fn llm_span_proto() -> Span {
    Span {
        name: "chat gpt-4o".to_string(),
        span_id: hex::decode(SPAN_ID_HEX).unwrap(),
        parent_span_id: hex::decode(PARENT_ID_HEX).unwrap(),
        start_time_unix_nano: START_NS,
        end_time_unix_nano: END_NS,
        status: Some(Status {
            code: 1,
            message: String::new(),
        }),
        attributes: vec![
            string_kv("gen_ai.request.model", "gpt-4o"),
            string_kv("gen_ai.prompt.0.role", "user"),
            string_kv("gen_ai.prompt.0.content", "hello"),
            string_kv("gen_ai.completion.0.role", "assistant"),
            string_kv("gen_ai.completion.0.content", "hi there"),
            string_kv("gen_ai.completion.0.finish_reason", "stop"),
            kv("gen_ai.usage.prompt_tokens", any_value::Value::IntValue(5)),
            kv("gen_ai.usage.completion_tokens", any_value::Value::IntValue(3)),
            kv("gen_ai.custom.flag", any_value::Value::BoolValue(true)),
        ],
        ..Default::default()
    }
}

fn request(spans: Vec<Span>) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            scope_spans: vec![ScopeSpans {
                spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

// ============================================================================
// SINGLE SPAN
// ============================================================================

#[test]
fn test_llm_span_produces_start_and_end() {
    let events = span_to_events(&wrap(vec![llm_span_json(1, "")]), SpanKind::Llm);
    assert_eq!(events.len(), 2);
    let (start, end) = (&events[0], &events[1]);

    assert_eq!(start.kind, EventType::Llm);
    assert_eq!(start.event.as_deref(), Some("start"));
    assert_eq!(end.event.as_deref(), Some("end"));
    assert_eq!(start.run_id, end.run_id);
    assert_eq!(
        start.run_id.as_deref(),
        Some("00000000-0000-0000-aabb-ccdd11223344")
    );
    assert_eq!(
        start.parent_run_id.as_deref(),
        Some("00000000-0000-0000-0102-030405060708")
    );
    assert_eq!(start.name.as_deref(), Some("gpt-4o"));
    assert_eq!(end.name, start.name);
    assert_eq!(start.input, Some(json!([{"role": "user", "content": "hello"}])));
    assert_eq!(
        end.output,
        Some(json!([{"role": "assistant", "content": "hi there"}]))
    );
    assert_eq!(
        end.tokens_usage,
        Some(TokenUsage {
            prompt: Some(5),
            completion: Some(3)
        })
    );
    assert_eq!(start.timestamp.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(end.timestamp.timestamp_millis(), 1_700_000_001_500);
    assert!(end.error.is_none());
}

#[test]
fn test_error_status_maps_to_error_event() {
    let events = span_to_events(&llm_span_json(2, "boom"), SpanKind::Llm);
    let end = &events[1];
    assert_eq!(end.event.as_deref(), Some("error"));
    assert_eq!(end.error.as_ref().map(|e| e.message.as_str()), Some("boom"));
    assert!(end.output.is_none());
    assert!(end.tokens_usage.is_none());
}

#[test]
fn test_error_status_without_message() {
    let events = span_to_events(&llm_span_json(2, ""), SpanKind::Llm);
    assert_eq!(
        events[1].error.as_ref().map(|e| e.message.as_str()),
        Some("Unknown error")
    );
}

#[test]
fn test_error_status_missing_message() {
    let mut span = llm_span_json(2, "");
    span["status"] = json!({"code": 2});
    let events = span_to_events(&span, SpanKind::Llm);
    assert_eq!(events[1].event.as_deref(), Some("error"));
    assert_eq!(
        events[1].error.as_ref().map(|e| e.message.as_str()),
        Some("Unknown error")
    );
}

#[test]
fn test_metadata_excludes_extracted_fields() {
    let events = span_to_events(&llm_span_json(1, ""), SpanKind::Llm);
    for event in &events {
        let meta = event.metadata.as_ref().and_then(JsonValue::as_object).unwrap();
        assert_eq!(meta.get("flag"), Some(&json!(true)));
        assert!(!meta.contains_key("prompt.0.content"));
        assert!(!meta.contains_key("content"));
        assert!(!meta.contains_key("model"));
        assert!(!meta.contains_key("prompt_tokens"));
    }
}

#[test]
fn test_chain_kind_uses_span_name() {
    let events = span_to_events(&llm_span_json(1, ""), SpanKind::Chain);
    assert_eq!(events[0].kind, EventType::Chain);
    assert_eq!(events[0].name.as_deref(), Some("chat gpt-4o"));
}

#[test]
fn test_root_span_has_no_parent() {
    let mut span = llm_span_json(1, "");
    span["parentSpanId"] = json!("0000000000000000");
    let events = span_to_events(&span, SpanKind::Llm);
    assert_eq!(events[0].parent_run_id, None);
    assert_eq!(events[1].parent_run_id, None);
}

#[test]
fn test_span_without_id_gets_random_shared_id() {
    let span = json!({"name": "step", "attributes": []});
    let events = span_to_events(&span, SpanKind::Chain);
    let id = events[0].run_id.clone().unwrap();
    assert_eq!(events[1].run_id.as_deref(), Some(id.as_str()));
    assert!(uuid::Uuid::parse_str(&id).is_ok());
}

#[test]
fn test_attributeless_payload_yields_empty_metadata() {
    let events = span_to_events(&json!({"name": "orphan"}), SpanKind::Chain);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].metadata, Some(json!({})));
    assert_eq!(events[0].input, None);
}

#[test]
fn test_snake_case_json_is_accepted() {
    let span = json!({
        "name": "s",
        "span_id": SPAN_ID_HEX,
        "start_time_unix_nano": START_NS,
        "attributes": [{"key": "gen_ai.request.model", "value": {"string_value": "m"}}]
    });
    let events = span_to_events(&span, SpanKind::Llm);
    assert_eq!(events[0].name.as_deref(), Some("m"));
    assert_eq!(
        events[0].run_id.as_deref(),
        Some("00000000-0000-0000-aabb-ccdd11223344")
    );
    assert_eq!(events[0].timestamp.timestamp_millis(), 1_700_000_000_000);
}

// ============================================================================
// BATCH
// ============================================================================

#[test]
fn test_trace_to_events_flattens_all_spans() {
    let tool = json!({
        "name": "search",
        "spanId": "1111111111111111",
        "parentSpanId": SPAN_ID_HEX,
        "attributes": [attr("tool.name", json!({"stringValue": "search"}))]
    });
    let payload = json!({
        "resourceSpans": [
            {"scopeSpans": [{"spans": [llm_span_json(1, "")]}]},
            {"scopeSpans": [{"spans": [tool]}]}
        ]
    });
    let events = trace_to_events(&payload);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].kind, EventType::Llm);
    assert_eq!(events[2].kind, EventType::Chain);
    assert_eq!(events[2].name.as_deref(), Some("search"));
    assert_eq!(events[2].parent_run_id, events[0].run_id);
}

#[test]
fn test_trace_to_events_non_object_is_empty() {
    assert!(trace_to_events(&json!(42)).is_empty());
    assert!(trace_to_events(&json!({})).is_empty());
}

#[test]
fn test_trace_to_events_empty_exports_yield_nothing() {
    let empty_shapes = [
        json!({"resourceSpans": []}),
        json!({"resourceSpans": [{"scopeSpans": [{"spans": []}]}]}),
        json!({"scopeSpans": []}),
        json!([]),
    ];
    for payload in empty_shapes {
        assert!(trace_to_events(&payload).is_empty(), "payload: {}", payload);
    }
    assert!(request_to_events(&request(vec![])).is_empty());
}

#[test]
fn test_trace_to_events_bare_object_is_one_span() {
    let events = trace_to_events(&json!({"name": "orphan", "spanId": SPAN_ID_HEX}));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name.as_deref(), Some("orphan"));
}

#[test]
fn test_protobuf_and_json_translate_identically() {
    let from_proto = request_to_events(&request(vec![llm_span_proto()]));
    let from_json = trace_to_events(&wrap(vec![llm_span_json(1, "")]));
    assert_eq!(from_proto, from_json);
}

#[test]
fn test_protobuf_error_status() {
    let mut span = llm_span_proto();
    span.status = Some(Status {
        code: 2,
        message: "quota".to_string(),
    });
    let events = request_to_events(&request(vec![span]));
    assert_eq!(events[1].event.as_deref(), Some("error"));
    assert_eq!(
        events[1].error.as_ref().map(|e| e.message.as_str()),
        Some("quota")
    );
}
