//! Event normalization
//!
//! Turns loosely-typed tracking payloads (mixed casing, deprecated type names,
//! JSON-in-a-string) into the canonical [`Event`] consumed by ingestion.

mod error;
mod normalize;
mod types;
pub mod usage;


pub use error::EventError;
pub use normalize::normalize;
pub use types::{ErrorInfo, Event, EventType, Lifecycle, TokenUsage};
