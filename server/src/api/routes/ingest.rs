//! Tracking event ingestion endpoint

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::api::types::{ApiError, is_valid_project_id};
use crate::domain::{IngestOutcome, IngestService};

#[derive(Clone)]
pub struct IngestState {
    pub service: IngestService,
    pub max_batch_events: usize,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub results: Vec<IngestOutcome>,
}

pub fn routes(service: IngestService, max_batch_events: usize) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .with_state(IngestState {
            service,
            max_batch_events,
        })
}

/// Accepts one event, an array of events, or `{"events": [...]}`.
pub async fn ingest(
    State(state): State<IngestState>,
    Path(project_id): Path<String>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    if !is_valid_project_id(&project_id) {
        return Err(ApiError::invalid_project_id());
    }

    let payload: JsonValue = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected ingest body");
        ApiError::bad_request("INVALID_JSON", "Request body must be valid JSON")
    })?;
    let events = split_batch(payload)?;

    if events.len() > state.max_batch_events {
        return Err(ApiError::payload_too_large(
            "TOO_MANY_EVENTS",
            format!(
                "Batch of {} events exceeds the limit of {}",
                events.len(),
                state.max_batch_events
            ),
        ));
    }

    let count = events.len();
    let results = state.service.ingest(&project_id, events).await;
    let failed = results.iter().filter(|r| !r.is_ok()).count();
    tracing::debug!(project_id = %project_id, count, failed, "Ingested batch");

    Ok(Json(IngestResponse { results }))
}

fn split_batch(payload: JsonValue) -> Result<Vec<JsonValue>, ApiError> {
    match payload {
        JsonValue::Array(events) => Ok(events),
        JsonValue::Object(mut map) => match map.remove("events") {
            Some(JsonValue::Array(events)) => Ok(events),
            Some(_) => Err(ApiError::bad_request(
                "INVALID_EVENTS",
                "`events` must be an array",
            )),
            None => Ok(vec![JsonValue::Object(map)]),
        },
        _ => Err(ApiError::bad_request(
            "INVALID_EVENTS",
            "Body must be an event, an array of events or {\"events\": [...]}",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_batch_shapes() {
        assert_eq!(split_batch(json!([{"a": 1}, {"b": 2}])).unwrap().len(), 2);
        assert_eq!(
            split_batch(json!({"events": [{"a": 1}]})).unwrap(),
            vec![json!({"a": 1})]
        );
        assert_eq!(
            split_batch(json!({"type": "llm"})).unwrap(),
            vec![json!({"type": "llm"})]
        );
    }

    #[test]
    fn test_split_batch_rejects_scalars() {
        assert!(split_batch(json!("hello")).is_err());
        assert!(split_batch(json!({"events": "nope"})).is_err());
    }
}
