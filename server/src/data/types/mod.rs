//! Shared data types for all run store backends

mod patch;
mod run;

pub use patch::Patch;
pub use run::{RunInsert, RunRow, RunStatus, RunType, RunUpdate, ThreadUpsert};
