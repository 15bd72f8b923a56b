//! API server initialization

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::routes::{health, ingest, otlp};
use super::types::handle_404;
use crate::core::CoreApp;
use crate::core::config::DatabaseBackend;
use crate::core::constants::{INGEST_BODY_LIMIT, OTLP_BODY_LIMIT};
use crate::domain::IngestService;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app } = self;
        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(
            host.parse::<IpAddr>()
                .with_context(|| format!("Invalid server host: {}", host))?,
            port,
        );

        let router = build_router(
            app.ingest.clone(),
            app.store.backend(),
            app.config.ingest.max_batch_events,
            app.config.otel.enabled,
        );

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(%addr, backend = %app.store.backend(), "Listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}

/// Assemble the HTTP surface
pub fn build_router(
    service: IngestService,
    backend: DatabaseBackend,
    max_batch_events: usize,
    otel_enabled: bool,
) -> Router {
    let ingest_routes = ingest::routes(service.clone(), max_batch_events)
        .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT));

    let router = Router::new()
        .route("/api/v1/health", get(health::health).with_state(backend))
        .nest("/api/v1/projects/{project_id}/runs", ingest_routes);

    let router = if otel_enabled {
        let otlp_routes = otlp::routes(service).layer(DefaultBodyLimit::max(OTLP_BODY_LIMIT));
        router.nest("/api/v1/projects/{project_id}/otel/v1", otlp_routes)
    } else {
        tracing::debug!("OTLP endpoint disabled by config");
        router
    };

    router.fallback(handle_404).layer(TraceLayer::new_for_http())
}
