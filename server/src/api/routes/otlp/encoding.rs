//! OTLP content-type handling
//!
//! Protobuf bodies are decoded into `opentelemetry-proto` types. JSON bodies
//! stay a loose tree so exporters that wrap spans differently still work.

use std::fmt;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Content type for OTLP requests/responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpContentType {
    Protobuf,
    Json,
}

impl OtlpContentType {
    /// Defaults to protobuf if content type is missing or unrecognized.
    #[inline]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            OtlpContentType::Json
        } else {
            OtlpContentType::Protobuf
        }
    }

    #[inline]
    pub fn as_header_value(self) -> &'static str {
        match self {
            OtlpContentType::Protobuf => "application/x-protobuf",
            OtlpContentType::Json => "application/json",
        }
    }

    #[inline]
    fn decode_error_message(self) -> &'static str {
        match self {
            OtlpContentType::Protobuf => "Failed to decode protobuf request",
            OtlpContentType::Json => "Failed to decode JSON request",
        }
    }
}

/// A decoded trace export
#[derive(Debug)]
pub enum TracePayload {
    Proto(ExportTraceServiceRequest),
    Json(JsonValue),
}

/// Decode a trace export body based on content type
pub fn decode_traces(body: &Bytes, content_type: OtlpContentType) -> Result<TracePayload, DecodeError> {
    match content_type {
        OtlpContentType::Protobuf => ExportTraceServiceRequest::decode(body.as_ref())
            .map(TracePayload::Proto)
            .map_err(|e| DecodeError::Protobuf(e.to_string())),
        OtlpContentType::Json => serde_json::from_slice(body.as_ref())
            .map(TracePayload::Json)
            .map_err(|e| DecodeError::Json(e.to_string())),
    }
}

fn encode_response<T>(response: &T, content_type: OtlpContentType) -> Result<Vec<u8>, String>
where
    T: Message + Serialize,
{
    match content_type {
        OtlpContentType::Protobuf => Ok(response.encode_to_vec()),
        OtlpContentType::Json => serde_json::to_vec(response).map_err(|e| e.to_string()),
    }
}

/// Create a successful OTLP response with the correct content type
pub fn success_response<T>(response: &T, content_type: OtlpContentType) -> Response
where
    T: Message + Serialize,
{
    match encode_response(response, content_type) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type.as_header_value())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode OTLP response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "Internal server error",
            )
                .into_response()
        }
    }
}

/// Error returned when decoding fails
#[derive(Debug)]
pub enum DecodeError {
    Protobuf(String),
    Json(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Protobuf(e) => write!(f, "protobuf decode error: {}", e),
            DecodeError::Json(e) => write!(f, "JSON decode error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// Internal error details are logged but not exposed to clients.
    pub fn into_response(self, content_type: OtlpContentType) -> Response {
        tracing::warn!(
            error = %self,
            content_type = content_type.as_header_value(),
            "Failed to decode OTLP request"
        );

        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            content_type.decode_error_message(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceResponse;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

    fn make_request() -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans: vec![Span {
                        name: "chat gpt-4o".to_string(),
                        span_id: vec![0xaa, 0xbb, 0xcc, 0xdd, 0x11, 0x22, 0x33, 0x44],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    // ==========================================================================
    // Content-Type Detection
    // ==========================================================================

    #[test]
    fn test_content_type_json_with_charset() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/json; charset=utf-8".parse().unwrap(),
        );
        assert_eq!(OtlpContentType::from_headers(&headers), OtlpContentType::Json);
    }

    #[test]
    fn test_content_type_missing_defaults_to_protobuf() {
        assert_eq!(
            OtlpContentType::from_headers(&HeaderMap::new()),
            OtlpContentType::Protobuf
        );
    }

    // ==========================================================================
    // Decoding
    // ==========================================================================

    #[test]
    fn test_decode_protobuf() {
        let bytes = Bytes::from(make_request().encode_to_vec());
        match decode_traces(&bytes, OtlpContentType::Protobuf).unwrap() {
            TracePayload::Proto(request) => {
                assert_eq!(request.resource_spans[0].scope_spans[0].spans[0].name, "chat gpt-4o");
            }
            other => panic!("expected protobuf payload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_keeps_loose_tree() {
        let bytes = Bytes::from(r#"{"data": {"resourceSpans": []}}"#);
        match decode_traces(&bytes, OtlpContentType::Json).unwrap() {
            TracePayload::Json(value) => assert!(value["data"]["resourceSpans"].is_array()),
            other => panic!("expected JSON payload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let bytes = Bytes::from_static(b"\xff\xff\xff");
        assert!(decode_traces(&bytes, OtlpContentType::Protobuf).is_err());
        assert!(decode_traces(&bytes, OtlpContentType::Json).is_err());
    }

    #[test]
    fn test_success_response_content_type() {
        let response = ExportTraceServiceResponse {
            partial_success: None,
        };
        let res = success_response(&response, OtlpContentType::Json);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
