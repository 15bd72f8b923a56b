//! Traces export endpoint

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTracePartialSuccess, ExportTraceServiceResponse,
};

use super::OtlpState;
use super::encoding::{OtlpContentType, TracePayload, decode_traces, success_response};
use crate::api::types::{ApiError, is_valid_project_id};
use crate::domain::IngestOutcome;

pub async fn export(
    State(state): State<OtlpState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_valid_project_id(&project_id) {
        return ApiError::invalid_project_id().into_response();
    }

    let content_type = OtlpContentType::from_headers(&headers);
    let outcomes = match decode_traces(&body, content_type) {
        Ok(TracePayload::Proto(request)) => state.service.ingest_otel(&project_id, &request).await,
        Ok(TracePayload::Json(payload)) => {
            state.service.ingest_otel_json(&project_id, &payload).await
        }
        Err(e) => return e.into_response(content_type),
    };

    tracing::debug!(project_id = %project_id, events = outcomes.len(), "Ingested OTLP traces");

    let response = ExportTraceServiceResponse {
        partial_success: partial_success(&outcomes),
    };
    success_response(&response, content_type)
}

/// Spans with any failed event are reported as rejected, with the first
/// error as message.
///
/// Outcomes follow translation order: each span yields a start event and an
/// end (or error) event.
fn partial_success(outcomes: &[IngestOutcome]) -> Option<ExportTracePartialSuccess> {
    let first = outcomes.iter().find_map(|o| o.error.as_deref())?;
    let rejected = outcomes
        .chunks(2)
        .filter(|span| span.iter().any(|o| !o.is_ok()))
        .count();
    Some(ExportTracePartialSuccess {
        rejected_spans: rejected as i64,
        error_message: first.to_string(),
    })
}
