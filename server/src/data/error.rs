//! Unified error type for data layer
//!
//! Wraps backend-specific errors while preserving which backend produced them.

use thiserror::Error;

use crate::data::postgres::PostgresError;

#[derive(Error, Debug)]
pub enum DataError {
    /// PostgreSQL database error
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duplicate primary key
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Target row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DataError {
    pub fn migration_failed(backend: &'static str, version: i32, name: &str, error: &str) -> Self {
        Self::MigrationFailed {
            backend,
            version,
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Postgres(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::MigrationFailed { backend, .. } => backend,
            Self::Config(_) | Self::Conflict(_) | Self::NotFound(_) => "unknown",
        }
    }
}

impl From<PostgresError> for DataError {
    fn from(e: PostgresError) -> Self {
        match e {
            PostgresError::Database(e) => Self::Postgres(e),
            PostgresError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "postgres",
                version,
                name,
                error,
            },
            PostgresError::Config(msg) => Self::Config(msg),
            PostgresError::Conflict(msg) => Self::Conflict(msg),
            PostgresError::NotFound(msg) => Self::NotFound(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = DataError::migration_failed("postgres", 2, "add_run_seq", "syntax error");
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_run_seq) failed on postgres: syntax error"
        );
    }

    #[test]
    fn test_backend_method() {
        assert_eq!(DataError::Postgres(sqlx::Error::PoolClosed).backend(), "postgres");
        assert_eq!(
            DataError::migration_failed("postgres", 1, "test", "error").backend(),
            "postgres"
        );
        assert_eq!(DataError::Conflict("dup".into()).backend(), "unknown");
    }

    #[test]
    fn test_is_transient() {
        assert!(DataError::Postgres(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!DataError::Postgres(sqlx::Error::RowNotFound).is_transient());
        assert!(!DataError::Config("bad config".into()).is_transient());
        assert!(!DataError::NotFound("run".into()).is_transient());
    }

    #[test]
    fn test_from_postgres_error() {
        let err: DataError = PostgresError::Conflict("run abc exists".into()).into();
        assert!(matches!(err, DataError::Conflict(_)));
        let err: DataError = PostgresError::Config("missing URL".into()).into();
        assert!(matches!(err, DataError::Config(_)));
    }
}
