//! Run store rows and mutations

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::Patch;

// ============================================================================
// ENUMS
// ============================================================================

/// Persisted run classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Llm,
    Chain,
    Agent,
    Tool,
    Log,
    Embed,
    Retriever,
    /// One reconciled user-turn / bot-turn exchange.
    Chat,
    /// Conversation container; exchanges hang off it via `parent_run`.
    Thread,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Chain => "chain",
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Log => "log",
            Self::Embed => "embed",
            Self::Retriever => "retriever",
            Self::Chat => "chat",
            Self::Thread => "thread",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "llm" => Some(Self::Llm),
            "chain" => Some(Self::Chain),
            "agent" => Some(Self::Agent),
            "tool" => Some(Self::Tool),
            "log" => Some(Self::Log),
            "embed" => Some(Self::Embed),
            "retriever" => Some(Self::Retriever),
            "chat" => Some(Self::Chat),
            "thread" => Some(Self::Thread),
            _ => None,
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

// ============================================================================
// ROWS
// ============================================================================

/// Stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRow {
    pub id: Uuid,
    pub app: String,
    #[serde(rename = "type")]
    pub run_type: RunType,
    pub name: Option<String>,
    pub status: Option<RunStatus>,
    pub input: Option<JsonValue>,
    pub output: Option<JsonValue>,
    pub error: Option<JsonValue>,
    pub params: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub tags: Option<Vec<String>>,
    pub user: Option<String>,
    pub feedback: Option<JsonValue>,
    pub parent_run: Option<Uuid>,
    pub sibling_of: Option<Uuid>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// New run. `None` fields are omitted from the write.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInsert {
    pub id: Uuid,
    pub app: String,
    pub run_type: RunType,
    pub name: Option<String>,
    pub status: Option<RunStatus>,
    pub input: Option<JsonValue>,
    pub output: Option<JsonValue>,
    pub error: Option<JsonValue>,
    pub params: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub tags: Option<Vec<String>>,
    pub user: Option<String>,
    pub feedback: Option<JsonValue>,
    pub parent_run: Option<Uuid>,
    pub sibling_of: Option<Uuid>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunInsert {
    /// Bare insert with every optional column absent.
    pub fn new(id: Uuid, app: impl Into<String>, run_type: RunType, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            app: app.into(),
            run_type,
            name: None,
            status: None,
            input: None,
            output: None,
            error: None,
            params: None,
            metadata: None,
            tags: None,
            user: None,
            feedback: None,
            parent_run: None,
            sibling_of: None,
            prompt_tokens: None,
            completion_tokens: None,
            created_at,
            ended_at: None,
        }
    }

    /// Copy every column of a stored run under a new id.
    pub fn copy_of(row: &RunRow, id: Uuid) -> Self {
        Self {
            id,
            app: row.app.clone(),
            run_type: row.run_type,
            name: row.name.clone(),
            status: row.status,
            input: row.input.clone(),
            output: row.output.clone(),
            error: row.error.clone(),
            params: row.params.clone(),
            metadata: row.metadata.clone(),
            tags: row.tags.clone(),
            user: row.user.clone(),
            feedback: row.feedback.clone(),
            parent_run: row.parent_run,
            sibling_of: row.sibling_of,
            prompt_tokens: row.prompt_tokens,
            completion_tokens: row.completion_tokens,
            created_at: row.created_at,
            ended_at: row.ended_at,
        }
    }
}

impl From<RunInsert> for RunRow {
    fn from(run: RunInsert) -> Self {
        Self {
            id: run.id,
            app: run.app,
            run_type: run.run_type,
            name: run.name,
            status: run.status,
            input: run.input,
            output: run.output,
            error: run.error,
            params: run.params,
            metadata: run.metadata,
            tags: run.tags,
            user: run.user,
            feedback: run.feedback,
            parent_run: run.parent_run,
            sibling_of: run.sibling_of,
            prompt_tokens: run.prompt_tokens,
            completion_tokens: run.completion_tokens,
            created_at: run.created_at,
            ended_at: run.ended_at,
        }
    }
}

// ============================================================================
// UPDATES
// ============================================================================

/// In-place change to a stored run. Every column defaults to `Keep`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunUpdate {
    /// Re-key the run under a new id. The new id must be unused.
    pub id: Option<Uuid>,
    pub name: Patch<String>,
    pub status: Patch<RunStatus>,
    pub input: Patch<JsonValue>,
    pub output: Patch<JsonValue>,
    pub error: Patch<JsonValue>,
    pub params: Patch<JsonValue>,
    pub metadata: Patch<JsonValue>,
    pub tags: Patch<Vec<String>>,
    pub user: Patch<String>,
    pub feedback: Patch<JsonValue>,
    pub prompt_tokens: Patch<i64>,
    pub completion_tokens: Patch<i64>,
    pub ended_at: Patch<DateTime<Utc>>,
}

impl RunUpdate {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_keep()
            && self.status.is_keep()
            && self.input.is_keep()
            && self.output.is_keep()
            && self.error.is_keep()
            && self.params.is_keep()
            && self.metadata.is_keep()
            && self.tags.is_keep()
            && self.user.is_keep()
            && self.feedback.is_keep()
            && self.prompt_tokens.is_keep()
            && self.completion_tokens.is_keep()
            && self.ended_at.is_keep()
    }

    /// Apply to a stored row.
    pub fn apply_to(self, row: &mut RunRow) {
        if let Some(id) = self.id {
            row.id = id;
        }
        self.name.apply(&mut row.name);
        self.status.apply(&mut row.status);
        self.input.apply(&mut row.input);
        self.output.apply(&mut row.output);
        self.error.apply(&mut row.error);
        self.params.apply(&mut row.params);
        self.metadata.apply(&mut row.metadata);
        self.tags.apply(&mut row.tags);
        self.user.apply(&mut row.user);
        self.feedback.apply(&mut row.feedback);
        self.prompt_tokens.apply(&mut row.prompt_tokens);
        self.completion_tokens.apply(&mut row.completion_tokens);
        self.ended_at.apply(&mut row.ended_at);
    }
}

/// Insert-or-update of a thread container run.
///
/// On conflict the stored `input` is kept and `tags` are replaced only when
/// provided.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadUpsert {
    pub id: Uuid,
    pub app: String,
    pub input: Option<JsonValue>,
    pub tags: Option<Vec<String>>,
    pub user: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ThreadUpsert {
    pub fn into_insert(self) -> RunInsert {
        let mut run = RunInsert::new(self.id, self.app, RunType::Thread, self.created_at);
        run.input = self.input;
        run.tags = self.tags;
        run.user = self.user;
        run
    }

    /// Changes applied when the thread already exists.
    pub fn conflict_update(&self) -> RunUpdate {
        RunUpdate {
            tags: Patch::from_option(self.tags.clone()),
            user: Patch::from_option(self.user.clone()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_run_type_roundtrip() {
        for t in [
            RunType::Llm,
            RunType::Chain,
            RunType::Agent,
            RunType::Tool,
            RunType::Log,
            RunType::Embed,
            RunType::Retriever,
            RunType::Chat,
            RunType::Thread,
        ] {
            assert_eq!(RunType::parse(t.as_str()), Some(t));
        }
        assert_eq!(RunType::parse("convo"), None);
    }

    #[test]
    fn test_run_update_keep_is_noop() {
        let mut row: RunRow = RunInsert::new(Uuid::new_v4(), "app", RunType::Chat, ts()).into();
        row.input = Some(json!([{"role": "user"}]));
        row.tags = Some(vec!["t".to_string()]);
        let before = row.clone();

        let update = RunUpdate::default();
        assert!(update.is_empty());
        update.apply_to(&mut row);
        assert_eq!(row, before);
    }

    #[test]
    fn test_run_update_set_and_clear() {
        let mut row: RunRow = RunInsert::new(Uuid::new_v4(), "app", RunType::Chat, ts()).into();
        row.output = Some(json!([]));
        RunUpdate {
            output: Patch::Clear,
            feedback: Patch::Set(json!({"thumb": "up"})),
            ..Default::default()
        }
        .apply_to(&mut row);
        assert_eq!(row.output, None);
        assert_eq!(row.feedback, Some(json!({"thumb": "up"})));
    }

    #[test]
    fn test_thread_conflict_update_keeps_input() {
        let upsert = ThreadUpsert {
            id: Uuid::new_v4(),
            app: "app".to_string(),
            input: Some(json!({"role": "user", "content": "hi"})),
            tags: None,
            user: None,
            created_at: ts(),
        };
        let update = upsert.conflict_update();
        assert!(update.input.is_keep());
        assert!(update.tags.is_keep());
        assert!(update.is_empty());
    }
}
