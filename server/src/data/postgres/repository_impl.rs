//! RunRepository trait implementation for PostgreSQL

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::data::error::DataError;
use crate::data::traits::RunRepository;
use crate::data::types::{RunInsert, RunRow, RunUpdate, ThreadUpsert};

use super::PostgresService;
use super::repositories::run;

#[async_trait]
impl RunRepository for Arc<PostgresService> {
    async fn insert_run(&self, new_run: RunInsert) -> Result<(), DataError> {
        run::insert_run(self.pool(), new_run)
            .await
            .map_err(Into::into)
    }

    async fn update_run(&self, app: &str, id: Uuid, changes: RunUpdate) -> Result<(), DataError> {
        run::update_run(self.pool(), app, id, changes)
            .await
            .map_err(Into::into)
    }

    async fn upsert_thread(&self, thread: ThreadUpsert) -> Result<(), DataError> {
        run::upsert_thread(self.pool(), thread)
            .await
            .map_err(Into::into)
    }

    async fn latest_child_run(&self, app: &str, parent_id: Uuid) -> Result<Option<RunRow>, DataError> {
        run::latest_child_run(self.pool(), app, parent_id)
            .await
            .map_err(Into::into)
    }

    async fn get_run(&self, app: &str, id: Uuid) -> Result<Option<RunRow>, DataError> {
        run::get_run(self.pool(), app, id).await.map_err(Into::into)
    }
}
