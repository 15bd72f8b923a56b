//! OpenTelemetry Protocol (OTLP) HTTP trace endpoint

mod encoding;
mod traces;

use axum::Router;
use axum::routing::post;

use crate::domain::IngestService;

#[derive(Clone)]
pub struct OtlpState {
    pub service: IngestService,
}

pub fn routes(service: IngestService) -> Router {
    Router::new()
        .route("/traces", post(traces::export))
        .with_state(OtlpState { service })
}
