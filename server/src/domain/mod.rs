//! Ingestion core
//!
//! - `events` - Raw payload normalization into canonical events
//! - `identity` - Run id resolution for external identifiers
//! - `otel` - OpenTelemetry span translation
//! - `threads` - Chat message reconciliation into exchange runs
//! - `ingest` - Applies events to the run store

pub mod events;
pub mod identity;
pub mod ingest;
pub mod otel;
pub mod threads;

pub use events::{Event, EventError, normalize};
pub use ingest::{IngestError, IngestOutcome, IngestService};
