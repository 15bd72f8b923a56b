//! Canonical event types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::EventError;

// ============================================================================
// EVENT TYPE
// ============================================================================

/// Closed set of event types accepted by ingestion.
///
/// `Chat` and `Convo` are deprecated aliases kept for older SDKs; both resolve
/// to `Thread` through [`EventType::canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Llm,
    Chain,
    Agent,
    Tool,
    Log,
    Embed,
    Retriever,
    Chat,
    Convo,
    Message,
    Thread,
}

impl EventType {
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
            Self::Convo => "convo",
            Self::Message => "message",
            Self::Thread => "thread",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s {
            "llm" => Ok(Self::Llm),
            "chain" => Ok(Self::Chain),
            "agent" => Ok(Self::Agent),
            "tool" => Ok(Self::Tool),
            "log" => Ok(Self::Log),
            "embed" => Ok(Self::Embed),
            "retriever" => Ok(Self::Retriever),
            "chat" => Ok(Self::Chat),
            "convo" => Ok(Self::Convo),
            "message" => Ok(Self::Message),
            "thread" => Ok(Self::Thread),
            other => Err(EventError::UnknownType(other.to_string())),
        }
    }

    /// Resolve deprecated aliases.
    pub fn canonical(self) -> Self {
        match self {
            Self::Chat | Self::Convo => Self::Thread,
            other => other,
        }
    }

    /// Thread-scoped types whose message-bearing events go to the thread reconciler.
    pub fn is_conversational(self) -> bool {
        matches!(self.canonical(), Self::Thread | Self::Message)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Lifecycle marker carried in the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    End,
    Error,
    Feedback,
    Chat,
    Other,
}

impl Lifecycle {
    pub fn parse(s: &str) -> Self {
        match s {
            "start" => Self::Start,
            "end" => Self::End,
            "error" => Self::Error,
            "feedback" => Self::Feedback,
            "chat" => Self::Chat,
            _ => Self::Other,
        }
    }
}

// ============================================================================
// EVENT PAYLOAD PARTS
// ============================================================================

/// Prompt/completion token counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<u64>,
}

impl TokenUsage {
    /// Build a usage record, or `None` when both counts are absent.
    pub fn from_counts(prompt: Option<u64>, completion: Option<u64>) -> Option<Self> {
        if prompt.is_none() && completion.is_none() {
            None
        } else {
            Some(Self { prompt, completion })
        }
    }
}

/// Error details attached to `error` lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Read error details from a loose payload value.
    ///
    /// Strings become the message; objects contribute `message` and `stack`.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(Self::new(s.clone())),
            JsonValue::Object(map) => {
                let message = map
                    .get("message")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("Unknown error")
                    .to_string();
                let stack = map
                    .get("stack")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string);
                Some(Self { message, stack })
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

// ============================================================================
// CANONICAL EVENT
// ============================================================================

/// Canonical ingestion unit produced by normalization or OTEL translation.
///
/// `run_id` and `parent_run_id` have already been through identity
/// resolution. Optional fields are omitted from serialized output rather than
/// written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Remaining payload fields, passed through untouched.
    #[serde(flatten)]
    pub rest: Map<String, JsonValue>,
}

impl Event {
    /// Empty event of the given type stamped at `timestamp`.
    pub fn new(kind: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            app: None,
            event: None,
            level: None,
            run_id: None,
            parent_run_id: None,
            timestamp,
            name: None,
            input: None,
            output: None,
            message: None,
            extra: None,
            metadata: None,
            feedback: None,
            tags: None,
            user_id: None,
            tokens_usage: None,
            error: None,
            rest: Map::new(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.event
            .as_deref()
            .map(Lifecycle::parse)
            .unwrap_or(Lifecycle::Other)
    }

    /// Whether this event carries a chat message for the thread reconciler.
    pub fn is_chat_message(&self) -> bool {
        self.kind.is_conversational() && self.message.as_ref().is_some_and(|m| !m.is_null())
    }
}
