//! Ingestion service
//!
//! Applies canonical events to the run store. Chat messages go through the
//! thread reconciler; every other event follows the run lifecycle. Batches are
//! processed in order and a failing event never aborts the rest.

mod lifecycle;


use std::sync::Arc;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::data::{DataError, RunRepository};
use crate::domain::events::{Event, EventError, Lifecycle, normalize};
use crate::domain::otel;
use crate::domain::threads::{ChatEvent, ThreadAction, ThreadLocks, decide, thread_upsert};

pub use lifecycle::{RunWrite, plan};

/// Per-event ingestion failure
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Result of ingesting one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestOutcome {
    fn from_result(result: Result<Option<Uuid>, IngestError>) -> Self {
        match result {
            Ok(run_id) => Self { run_id, error: None },
            Err(e) => Self {
                run_id: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Applies events to a run repository
#[derive(Clone)]
pub struct IngestService {
    repo: Arc<dyn RunRepository>,
    locks: Option<ThreadLocks>,
}

impl IngestService {
    /// `thread_locking` serializes messages of the same thread in this process.
    pub fn new(repo: Arc<dyn RunRepository>, thread_locking: bool) -> Self {
        Self {
            repo,
            locks: thread_locking.then(ThreadLocks::new),
        }
    }

    /// Normalize and apply raw tracking payloads.
    pub async fn ingest(&self, app: &str, raw_events: Vec<JsonValue>) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::with_capacity(raw_events.len());
        for raw in raw_events {
            let result = match normalize(raw) {
                Ok(event) => self.apply(app, event).await,
                Err(e) => Err(e.into()),
            };
            outcomes.push(record(app, result));
        }
        outcomes
    }

    /// Apply already-canonical events.
    pub async fn ingest_events(&self, app: &str, events: Vec<Event>) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            let result = self.apply(app, event).await;
            outcomes.push(record(app, result));
        }
        outcomes
    }

    /// Translate and apply a decoded protobuf OTLP export.
    pub async fn ingest_otel(&self, app: &str, request: &ExportTraceServiceRequest) -> Vec<IngestOutcome> {
        self.ingest_events(app, otel::request_to_events(request)).await
    }

    /// Translate and apply a JSON OTLP export of any wrapping depth.
    pub async fn ingest_otel_json(&self, app: &str, payload: &JsonValue) -> Vec<IngestOutcome> {
        self.ingest_events(app, otel::trace_to_events(payload)).await
    }

    /// Apply one event. Returns the id of the run it landed on, if any.
    ///
    /// Events always land in the path project; a differing `app` field in the
    /// body is ignored.
    pub async fn apply(&self, app: &str, event: Event) -> Result<Option<Uuid>, IngestError> {
        if let Some(body_app) = event.app.as_deref().filter(|a| *a != app) {
            tracing::warn!(
                app,
                body_app,
                "Ignoring event app that differs from the path project"
            );
        }

        if is_chat(&event) {
            let chat = ChatEvent::from_event(&event, app)?;
            return self.apply_chat(chat).await.map(Some);
        }

        match plan(&event, app)? {
            Some(write) => self.apply_write(app, write).await.map(Some),
            None => {
                tracing::debug!(
                    event_type = %event.kind,
                    marker = event.event.as_deref().unwrap_or(""),
                    "Skipping event without a lifecycle write"
                );
                Ok(None)
            }
        }
    }

    async fn apply_chat(&self, chat: ChatEvent) -> Result<Uuid, IngestError> {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.lock(&chat.app, chat.thread_id).await),
            None => None,
        };

        self.repo.upsert_thread(thread_upsert(&chat)).await?;
        let previous = self
            .repo
            .latest_child_run(&chat.app, chat.thread_id)
            .await?;

        match decide(&chat, previous.as_ref()) {
            ThreadAction::Insert(run) => {
                let id = run.id;
                self.repo.insert_run(run).await?;
                tracing::trace!(run_id = %id, thread_id = %chat.thread_id, "Inserted exchange");
                Ok(id)
            }
            ThreadAction::Update { id, changes } => {
                let landed = changes.id.unwrap_or(id);
                self.repo.update_run(&chat.app, id, changes).await?;
                tracing::trace!(run_id = %landed, thread_id = %chat.thread_id, "Updated exchange");
                Ok(landed)
            }
        }
    }

    async fn apply_write(&self, app: &str, write: RunWrite) -> Result<Uuid, IngestError> {
        let id = write.run_id();
        match write {
            RunWrite::Insert(run) => match self.repo.insert_run(run.clone()).await {
                Err(DataError::Conflict(_)) => {
                    tracing::debug!(run_id = %id, "Replayed start, refreshing run");
                    self.repo
                        .update_run(app, id, lifecycle::start_as_update(run))
                        .await?;
                }
                other => other?,
            },
            RunWrite::UpsertThread(thread) => self.repo.upsert_thread(thread).await?,
            RunWrite::Update { id, changes } => self.repo.update_run(app, id, changes).await?,
        }
        Ok(id)
    }
}

fn record(app: &str, result: Result<Option<Uuid>, IngestError>) -> IngestOutcome {
    match &result {
        Err(IngestError::Event(e)) => {
            tracing::warn!(app, error = %e, "Rejected event");
        }
        Err(IngestError::Data(e)) => {
            tracing::error!(
                app,
                backend = e.backend(),
                transient = e.is_transient(),
                error = %e,
                "Failed to store event"
            );
        }
        Ok(_) => {}
    }
    IngestOutcome::from_result(result)
}

/// Message-bearing thread events, plus `chat` markers that forgot the message.
fn is_chat(event: &Event) -> bool {
    event.is_chat_message()
        || (event.kind.is_conversational() && event.lifecycle() == Lifecycle::Chat)
}
