//! Chat message reconciliation
//!
//! Collapses a stream of role-tagged chat messages into exchange runs under a
//! thread. An exchange holds one user turn and the bot turn that answers it.
//! Retries fork a sibling exchange so the original row is preserved.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::data::types::{Patch, RunInsert, RunRow, RunType, RunUpdate, ThreadUpsert};
use crate::domain::events::{Event, EventError};
use crate::domain::identity::parse_run_id;

const OUTPUT_ROLES: &[&str] = &["assistant", "tool", "bot"];
const INPUT_ROLES: &[&str] = &["user", "system"];

/// Which side of an exchange a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleClass {
    Output,
    Input,
    Other,
}

impl RoleClass {
    pub fn of(role: Option<&str>) -> Self {
        match role {
            Some(r) if OUTPUT_ROLES.contains(&r) => Self::Output,
            Some(r) if INPUT_ROLES.contains(&r) => Self::Input,
            _ => Self::Other,
        }
    }
}

/// Chat message as stored in a run's `input`/`output` list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Option<String>,
    pub is_retry: bool,
    /// Stored form: the payload object without the `isRetry` marker.
    pub body: Map<String, JsonValue>,
}

impl ChatMessage {
    /// Objects are taken as-is; a bare string becomes `{content}`.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        let mut body = match value {
            JsonValue::Object(map) => map.clone(),
            JsonValue::String(s) => {
                let mut map = Map::new();
                map.insert("content".to_string(), JsonValue::String(s.clone()));
                map
            }
            _ => return None,
        };
        let is_retry = body
            .remove("isRetry")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let role = body.get("role").and_then(|r| r.as_str()).map(str::to_string);
        Some(Self {
            role,
            is_retry,
            body,
        })
    }

    pub fn class(&self) -> RoleClass {
        RoleClass::of(self.role.as_deref())
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.body.clone())
    }
}

/// Chat event with its identifiers resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    pub run_id: Uuid,
    pub thread_id: Uuid,
    pub app: String,
    pub user: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Tags for the thread container; falls back to `tags`.
    pub thread_tags: Option<Vec<String>>,
    pub feedback: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
    pub message: ChatMessage,
}

impl ChatEvent {
    /// Resolve a canonical event into a chat event for `app`.
    pub fn from_event(event: &Event, app: &str) -> Result<Self, EventError> {
        let message = event
            .message
            .as_ref()
            .and_then(ChatMessage::from_value)
            .ok_or(EventError::MissingMessage)?;
        let run_id = parse_run_id(event.run_id.as_deref().ok_or(EventError::MissingRunId)?)?;
        let thread_id = parse_run_id(
            event
                .parent_run_id
                .as_deref()
                .ok_or(EventError::MissingThreadId)?,
        )?;
        let thread_tags = event
            .rest
            .get("threadTags")
            .and_then(|v| v.as_array())
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            });

        Ok(Self {
            run_id,
            thread_id,
            app: app.to_string(),
            user: event.user_id.clone(),
            tags: event.tags.clone(),
            thread_tags,
            feedback: event.feedback.clone(),
            timestamp: event.timestamp,
            message,
        })
    }
}

/// Store mutation chosen for one chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadAction {
    Insert(RunInsert),
    Update { id: Uuid, changes: RunUpdate },
}

/// Thread container upsert that precedes every message.
pub fn thread_upsert(event: &ChatEvent) -> ThreadUpsert {
    ThreadUpsert {
        id: event.thread_id,
        app: event.app.clone(),
        input: Some(event.message.to_json()),
        tags: event.thread_tags.clone().or_else(|| event.tags.clone()),
        user: event.user.clone(),
        created_at: event.timestamp,
    }
}

/// Decide the mutation for `event` given the thread's most recent exchange.
pub fn decide(event: &ChatEvent, previous: Option<&RunRow>) -> ThreadAction {
    let message = event.message.to_json();
    let class = event.message.class();

    let Some(prev) = previous else {
        let mut run = new_exchange(event);
        match class {
            RoleClass::Output => run.output = Some(JsonValue::Array(vec![message])),
            RoleClass::Input => run.input = Some(JsonValue::Array(vec![message])),
            RoleClass::Other => {}
        }
        return ThreadAction::Insert(run);
    };

    if event.message.is_retry {
        return ThreadAction::Insert(retry_exchange(event, prev, class, message));
    }

    match class {
        RoleClass::Output => ThreadAction::Update {
            id: prev.id,
            changes: RunUpdate {
                output: Patch::Set(append(prev.output.as_ref(), message)),
                ..shared_update(event)
            },
        },
        RoleClass::Input if !has_value(prev.output.as_ref()) => ThreadAction::Update {
            id: prev.id,
            changes: RunUpdate {
                input: Patch::Set(append(prev.input.as_ref(), message)),
                ..shared_update(event)
            },
        },
        RoleClass::Input => {
            let mut run = new_exchange(event);
            run.input = Some(JsonValue::Array(vec![message]));
            ThreadAction::Insert(run)
        }
        RoleClass::Other => ThreadAction::Insert(new_exchange(event)),
    }
}

fn retry_exchange(event: &ChatEvent, prev: &RunRow, class: RoleClass, message: JsonValue) -> RunInsert {
    // A retry that reuses the previous id still needs a row of its own
    let id = if event.run_id == prev.id {
        Uuid::new_v4()
    } else {
        event.run_id
    };

    let mut run = RunInsert::copy_of(prev, id);
    run.sibling_of = Some(prev.id);
    run.feedback = event.feedback.clone();
    match class {
        RoleClass::Output => run.output = Some(JsonValue::Array(vec![message])),
        RoleClass::Input => {
            run.input = Some(JsonValue::Array(vec![message]));
            run.output = None;
        }
        RoleClass::Other => {}
    }
    apply_insert_fields(&mut run, event);
    run
}

fn new_exchange(event: &ChatEvent) -> RunInsert {
    let mut run = RunInsert::new(event.run_id, event.app.clone(), RunType::Chat, event.timestamp);
    run.feedback = event.feedback.clone();
    apply_insert_fields(&mut run, event);
    run
}

fn apply_insert_fields(run: &mut RunInsert, event: &ChatEvent) {
    run.run_type = RunType::Chat;
    run.app = event.app.clone();
    run.created_at = event.timestamp;
    run.ended_at = Some(event.timestamp);
    run.parent_run = Some(event.thread_id);
    if let Some(tags) = &event.tags {
        run.tags = Some(tags.clone());
    }
    if let Some(user) = &event.user {
        run.user = Some(user.clone());
    }
}

/// Fields every in-place update carries. The row takes the new message id.
fn shared_update(event: &ChatEvent) -> RunUpdate {
    RunUpdate {
        id: Some(event.run_id),
        tags: Patch::from_option(event.tags.clone()),
        user: Patch::from_option(event.user.clone()),
        feedback: Patch::from_option(event.feedback.clone()),
        ended_at: Patch::Set(event.timestamp),
        ..Default::default()
    }
}

fn has_value(value: Option<&JsonValue>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

/// Append to a stored message list. A lone object counts as a one-element list.
fn append(existing: Option<&JsonValue>, message: JsonValue) -> JsonValue {
    let mut list = match existing {
        Some(JsonValue::Array(items)) => items.clone(),
        Some(JsonValue::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    };
    list.push(message);
    JsonValue::Array(list)
}
