//! In-memory run store
//!
//! Process-local backend for development, tests and single-process
//! deployments. Process exit loses all runs.
//!
//! Every insert is stamped with a monotonically increasing sequence number so
//! "most recently created" stays well defined when several runs share a
//! `created_at` instant.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::data::error::DataError;
use crate::data::traits::RunRepository;
use crate::data::types::{RunInsert, RunRow, RunUpdate, ThreadUpsert};

struct StoredRun {
    row: RunRow,
    seq: u64,
}

#[derive(Default)]
struct State {
    runs: HashMap<Uuid, StoredRun>,
    next_seq: u64,
}

impl State {
    fn insert(&mut self, row: RunRow) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.runs.insert(row.id, StoredRun { row, seq });
    }

    fn get_mut(&mut self, app: &str, id: Uuid) -> Option<&mut RunRow> {
        self.runs
            .get_mut(&id)
            .map(|stored| &mut stored.row)
            .filter(|row| row.app == app)
    }
}

/// In-memory run store
#[derive(Default)]
pub struct MemoryRunStore {
    state: RwLock<State>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs
    pub fn len(&self) -> usize {
        self.state.read().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All runs for `app` in insertion order
    pub fn runs_for_app(&self, app: &str) -> Vec<RunRow> {
        let state = self.state.read();
        let mut runs: Vec<&StoredRun> = state.runs.values().filter(|s| s.row.app == app).collect();
        runs.sort_by_key(|s| s.seq);
        runs.into_iter().map(|s| s.row.clone()).collect()
    }
}

#[async_trait]
impl RunRepository for MemoryRunStore {
    async fn insert_run(&self, run: RunInsert) -> Result<(), DataError> {
        let mut state = self.state.write();
        if state.runs.contains_key(&run.id) {
            return Err(DataError::Conflict(format!("run {} already exists", run.id)));
        }
        state.insert(run.into());
        Ok(())
    }

    async fn update_run(&self, app: &str, id: Uuid, changes: RunUpdate) -> Result<(), DataError> {
        let mut state = self.state.write();
        if state.get_mut(app, id).is_none() {
            return Err(DataError::NotFound(format!("run {}", id)));
        }

        match changes.id.filter(|new_id| *new_id != id) {
            Some(new_id) => {
                if state.runs.contains_key(&new_id) {
                    return Err(DataError::Conflict(format!("run {} already exists", new_id)));
                }
                if let Some(mut stored) = state.runs.remove(&id) {
                    changes.apply_to(&mut stored.row);
                    state.runs.insert(new_id, stored);
                }
            }
            None => {
                if let Some(row) = state.get_mut(app, id) {
                    changes.apply_to(row);
                }
            }
        }
        Ok(())
    }

    async fn upsert_thread(&self, thread: ThreadUpsert) -> Result<(), DataError> {
        let mut state = self.state.write();
        if state.runs.contains_key(&thread.id) {
            let update = thread.conflict_update();
            if let Some(row) = state.get_mut(&thread.app, thread.id) {
                update.apply_to(row);
                return Ok(());
            }
            return Err(DataError::Conflict(format!(
                "thread {} belongs to another app",
                thread.id
            )));
        }
        state.insert(thread.into_insert().into());
        Ok(())
    }

    async fn latest_child_run(&self, app: &str, parent_id: Uuid) -> Result<Option<RunRow>, DataError> {
        let state = self.state.read();
        Ok(state
            .runs
            .values()
            .filter(|s| s.row.app == app && s.row.parent_run == Some(parent_id))
            .max_by_key(|s| (s.row.created_at, s.seq))
            .map(|s| s.row.clone()))
    }

    async fn get_run(&self, app: &str, id: Uuid) -> Result<Option<RunRow>, DataError> {
        let state = self.state.read();
        Ok(state
            .runs
            .get(&id)
            .filter(|s| s.row.app == app)
            .map(|s| s.row.clone()))
    }
}
