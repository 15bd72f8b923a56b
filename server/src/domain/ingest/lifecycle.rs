//! Lifecycle events to run writes
//!
//! Non-chat events follow a start / end / error / feedback lifecycle keyed by
//! `runId`. `start` creates the run (or upserts a thread container), the other
//! markers patch it.

use uuid::Uuid;

use crate::data::types::{Patch, RunInsert, RunStatus, RunType, RunUpdate, ThreadUpsert};
use crate::domain::events::{Event, EventError, EventType, Lifecycle, TokenUsage};
use crate::domain::identity::parse_run_id;

/// Store write for one lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum RunWrite {
    Insert(RunInsert),
    UpsertThread(ThreadUpsert),
    Update { id: Uuid, changes: RunUpdate },
}

impl RunWrite {
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Insert(run) => run.id,
            Self::UpsertThread(thread) => thread.id,
            Self::Update { id, .. } => *id,
        }
    }
}

pub fn run_type_for(kind: EventType) -> RunType {
    match kind.canonical() {
        EventType::Llm => RunType::Llm,
        EventType::Chain => RunType::Chain,
        EventType::Agent => RunType::Agent,
        EventType::Tool => RunType::Tool,
        EventType::Log => RunType::Log,
        EventType::Embed => RunType::Embed,
        EventType::Retriever => RunType::Retriever,
        EventType::Message => RunType::Chat,
        EventType::Chat | EventType::Convo | EventType::Thread => RunType::Thread,
    }
}

/// Map an event onto a store write. `None` for markers that carry no write.
pub fn plan(event: &Event, app: &str) -> Result<Option<RunWrite>, EventError> {
    let id = || -> Result<Uuid, EventError> {
        parse_run_id(event.run_id.as_deref().ok_or(EventError::MissingRunId)?)
    };

    let write = match event.lifecycle() {
        Lifecycle::Chat | Lifecycle::Other => return Ok(None),
        Lifecycle::Start => start_write(event, app, id()?)?,
        Lifecycle::End => {
            let usage = event.tokens_usage.unwrap_or_default();
            RunWrite::Update {
                id: id()?,
                changes: RunUpdate {
                    status: Patch::Set(RunStatus::Success),
                    output: Patch::from_option(event.output.clone()),
                    prompt_tokens: token_patch(usage, |u| u.prompt),
                    completion_tokens: token_patch(usage, |u| u.completion),
                    ended_at: Patch::Set(event.timestamp),
                    ..Default::default()
                },
            }
        }
        Lifecycle::Error => RunWrite::Update {
            id: id()?,
            changes: RunUpdate {
                status: Patch::Set(RunStatus::Error),
                error: Patch::from_option(event.error.as_ref().map(|e| e.to_json())),
                ended_at: Patch::Set(event.timestamp),
                ..Default::default()
            },
        },
        Lifecycle::Feedback => RunWrite::Update {
            id: id()?,
            changes: RunUpdate {
                feedback: Patch::from_option(event.feedback.clone()),
                ..Default::default()
            },
        },
    };
    Ok(Some(write))
}

fn start_write(event: &Event, app: &str, id: Uuid) -> Result<RunWrite, EventError> {
    if event.kind.canonical() == EventType::Thread {
        return Ok(RunWrite::UpsertThread(ThreadUpsert {
            id,
            app: app.to_string(),
            input: event.input.clone(),
            tags: event.tags.clone(),
            user: event.user_id.clone(),
            created_at: event.timestamp,
        }));
    }

    let parent_run = event
        .parent_run_id
        .as_deref()
        .map(parse_run_id)
        .transpose()?;

    let mut run = RunInsert::new(id, app, run_type_for(event.kind), event.timestamp);
    run.name = event.name.clone();
    run.status = Some(RunStatus::Started);
    run.input = event.input.clone();
    run.tags = event.tags.clone();
    run.user = event.user_id.clone();
    run.parent_run = parent_run;
    run.params = event.extra.clone();
    run.metadata = event.metadata.clone();
    Ok(RunWrite::Insert(run))
}

fn token_patch(usage: TokenUsage, pick: impl Fn(TokenUsage) -> Option<u64>) -> Patch<i64> {
    Patch::from_option(pick(usage).and_then(|n| i64::try_from(n).ok()))
}

/// Replayed `start` for an existing run: refresh the start fields in place.
pub fn start_as_update(run: RunInsert) -> RunUpdate {
    RunUpdate {
        name: Patch::from_option(run.name),
        status: Patch::from_option(run.status),
        input: Patch::from_option(run.input),
        params: Patch::from_option(run.params),
        metadata: Patch::from_option(run.metadata),
        tags: Patch::from_option(run.tags),
        user: Patch::from_option(run.user),
        ..Default::default()
    }
}
