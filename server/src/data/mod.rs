//! Data storage layer
//!
//! Provides the run store used by ingestion:
//! - `memory` - Process-local run store (default)
//! - `postgres` - PostgreSQL run store for shared deployments
//! - `types` - Row and mutation types shared by all backends
//! - `traits` - `RunRepository`, the backend-agnostic interface
//! - `error` - Unified error type for all backends

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use memory::MemoryRunStore;
pub use postgres::PostgresService;
pub use traits::RunRepository;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{DatabaseBackend, PostgresConfig};

/// Run store service enum
///
/// Wraps the configured backend. Services are stored as Arc so the repository
/// handle can be shared with the ingest service.
pub enum RunStoreService {
    /// In-memory backend (default, single process)
    Memory(Arc<MemoryRunStore>),
    /// PostgreSQL backend
    Postgres(Arc<PostgresService>),
}

impl RunStoreService {
    /// Initialize the run store based on configuration
    ///
    /// The PostgreSQL backend requires a `PostgresConfig`.
    pub async fn init(
        backend: DatabaseBackend,
        postgres_config: Option<&PostgresConfig>,
    ) -> Result<Self, DataError> {
        match backend {
            DatabaseBackend::Memory => Ok(Self::Memory(Arc::new(MemoryRunStore::new()))),
            DatabaseBackend::Postgres => {
                let config = postgres_config.ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(config).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Memory(_) => DatabaseBackend::Memory,
            Self::Postgres(_) => DatabaseBackend::Postgres,
        }
    }

    /// Backend-agnostic repository handle
    pub fn repository(&self) -> Arc<dyn RunRepository> {
        match self {
            Self::Memory(m) => Arc::clone(m) as Arc<dyn RunRepository>,
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }

    /// Start background maintenance (PostgreSQL health checks).
    pub fn start_health_check_task(&self, shutdown_rx: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        match self {
            Self::Memory(_) => None,
            Self::Postgres(p) => Some(p.start_health_check_task(shutdown_rx)),
        }
    }

    /// Close connections gracefully
    pub async fn close(&self) {
        match self {
            Self::Memory(_) => {}
            Self::Postgres(p) => p.close().await,
        }
    }
}
