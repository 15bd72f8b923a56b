//! Protobuf span input

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::Span;
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

use super::convert::{SpanRecord, ns_to_datetime};
use crate::utils::otlp::build_attributes_map;

impl SpanRecord {
    /// Read a decoded protobuf span.
    pub fn from_proto(span: &Span) -> Self {
        let status = span.status.as_ref();
        Self {
            name: (!span.name.is_empty()).then(|| span.name.clone()),
            attributes: build_attributes_map(&span.attributes),
            start: ns_to_datetime(nonzero(span.start_time_unix_nano)),
            end: ns_to_datetime(nonzero(span.end_time_unix_nano)),
            status_code: status
                .and_then(|s| StatusCode::try_from(s.code).ok())
                .unwrap_or(StatusCode::Unset),
            status_message: status
                .map(|s| s.message.clone())
                .filter(|m| !m.is_empty()),
            span_id: (!span.span_id.is_empty()).then(|| span.span_id.clone()),
            parent_span_id: (!span.parent_span_id.is_empty()).then(|| span.parent_span_id.clone()),
        }
    }
}

/// Every span of a decoded export request, in document order.
pub fn request_spans(request: &ExportTraceServiceRequest) -> impl Iterator<Item = &Span> {
    request
        .resource_spans
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .flat_map(|ss| &ss.spans)
}

/// Protobuf leaves unset timestamps as zero.
fn nonzero(nanos: u64) -> Option<u128> {
    (nanos != 0).then_some(u128::from(nanos))
}
