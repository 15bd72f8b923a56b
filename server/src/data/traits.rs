//! Repository traits for run store backends
//!
//! The ingestion core reads and writes runs only through [`RunRepository`].
//! Each backend (in-memory, PostgreSQL) implements it with its own logic.

use async_trait::async_trait;
use uuid::Uuid;

use crate::data::error::DataError;
use crate::data::types::{RunInsert, RunRow, RunUpdate, ThreadUpsert};

/// Repository trait for run persistence.
///
/// Lookups are scoped by `app`; ids are globally unique.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a new run. Fails with `DataError::Conflict` if the id exists.
    async fn insert_run(&self, run: RunInsert) -> Result<(), DataError>;

    /// Apply a partial update. Fails with `DataError::NotFound` if the run
    /// does not exist for `app`.
    async fn update_run(&self, app: &str, id: Uuid, changes: RunUpdate) -> Result<(), DataError>;

    /// Insert a thread container, or merge into the existing one.
    async fn upsert_thread(&self, thread: ThreadUpsert) -> Result<(), DataError>;

    /// Most recently created run whose `parent_run` is `parent_id`.
    ///
    /// Ties on `created_at` resolve to the later insert.
    async fn latest_child_run(&self, app: &str, parent_id: Uuid) -> Result<Option<RunRow>, DataError>;

    /// Get a single run by id
    async fn get_run(&self, app: &str, id: Uuid) -> Result<Option<RunRow>, DataError>;
}
