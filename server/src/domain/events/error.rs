//! Event input errors

use thiserror::Error;

/// Errors raised while turning a raw payload into a canonical event, or while
/// mapping a canonical event onto run mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event payload must be a JSON object")]
    NotAnObject,

    #[error("Event is missing a type")]
    MissingType,

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Event is missing a runId")]
    MissingRunId,

    #[error("Chat message is missing a parentRunId (thread id)")]
    MissingThreadId,

    #[error("Chat event is missing a message")]
    MissingMessage,

    #[error("Run id is not a valid UUID: {0}")]
    InvalidRunId(String),
}
