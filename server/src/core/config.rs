use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MAX_BATCH_EVENTS, DEFAULT_PORT,
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Database Backend Enum
// =============================================================================

/// Run store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Process-local store (default)
    #[default]
    Memory,
    /// Shared PostgreSQL store
    Postgres,
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// OpenTelemetry configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OtelFileConfig {
    pub enabled: Option<bool>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use RUNWEAVE_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Run store backend: memory (default) or postgres
    pub backend: Option<DatabaseBackend>,
    /// PostgreSQL-specific configuration
    pub postgres: Option<PostgresFileConfig>,
}

/// Ingestion configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub max_batch_events: Option<usize>,
    pub thread_locking: Option<bool>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub otel: Option<OtelFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Top-level keys this build does not recognize
    fn unknown_fields(&self) -> Vec<&str> {
        match &self.extra {
            serde_json::Value::Object(map) => map.keys().map(|k| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        let unknown = self.unknown_fields();
        if !unknown.is_empty() {
            tracing::warn!(
                fields = %unknown.join(", "),
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(otel) = other.otel {
            let current = self.otel.get_or_insert_with(OtelFileConfig::default);
            if otel.enabled.is_some() {
                tracing::trace!(enabled = ?otel.enabled, "Merging otel.enabled");
                current.enabled = otel.enabled;
            }
        }

        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            if database.backend.is_some() {
                tracing::trace!(backend = ?database.backend, "Merging database.backend");
                current.backend = database.backend;
            }
            if let Some(pg) = database.postgres {
                let current_pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                if pg.url.is_some() {
                    tracing::trace!("Merging database.postgres.url");
                    current_pg.url = pg.url;
                }
                if pg.max_connections.is_some() {
                    current_pg.max_connections = pg.max_connections;
                }
                if pg.min_connections.is_some() {
                    current_pg.min_connections = pg.min_connections;
                }
                if pg.acquire_timeout_secs.is_some() {
                    current_pg.acquire_timeout_secs = pg.acquire_timeout_secs;
                }
                if pg.idle_timeout_secs.is_some() {
                    current_pg.idle_timeout_secs = pg.idle_timeout_secs;
                }
                if pg.max_lifetime_secs.is_some() {
                    current_pg.max_lifetime_secs = pg.max_lifetime_secs;
                }
                if pg.statement_timeout_secs.is_some() {
                    current_pg.statement_timeout_secs = pg.statement_timeout_secs;
                }
            }
        }

        if let Some(ingest) = other.ingest {
            let current = self.ingest.get_or_insert_with(IngestFileConfig::default);
            if ingest.max_batch_events.is_some() {
                tracing::trace!(max_batch_events = ?ingest.max_batch_events, "Merging ingest.max_batch_events");
                current.max_batch_events = ingest.max_batch_events;
            }
            if ingest.thread_locking.is_some() {
                tracing::trace!(thread_locking = ?ingest.thread_locking, "Merging ingest.thread_locking");
                current.thread_locking = ingest.thread_locking;
            }
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize)]
pub struct OtelConfig {
    /// Accept OTLP trace exports
    pub enabled: bool,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone, Serialize)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL
    #[serde(skip_serializing)]
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Only present when a URL was configured
    pub postgres: Option<PostgresConfig>,
}

/// Ingestion configuration (final/runtime)
#[derive(Debug, Clone, Serialize)]
pub struct IngestConfig {
    /// Events accepted per request
    pub max_batch_events: usize,
    /// Serialize messages of the same thread within this process
    pub thread_locking: bool,
}

/// Final merged application configuration
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub otel: OtelConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.runweave/runweave.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_home(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::resolve(file_config, cli);
        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, file values and CLI/env overrides.
    fn resolve(file_config: FileConfig, cli: &CliConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_otel = file_config.otel.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_postgres = file_database.postgres.unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let backend = cli
            .database_backend
            .or(file_database.backend)
            .unwrap_or_default();

        let postgres = cli
            .postgres_url
            .clone()
            .or(file_postgres.url)
            .filter(|url| !url.is_empty())
            .map(|url| PostgresConfig {
                url,
                max_connections: file_postgres
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_postgres
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_postgres
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_postgres
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_postgres
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_postgres
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            });

        Self {
            server: ServerConfig { host, port },
            otel: OtelConfig {
                enabled: cli.otel.or(file_otel.enabled).unwrap_or(true),
            },
            database: DatabaseConfig { backend, postgres },
            ingest: IngestConfig {
                max_batch_events: cli
                    .max_batch_events
                    .or(file_ingest.max_batch_events)
                    .unwrap_or(DEFAULT_MAX_BATCH_EVENTS),
                thread_locking: cli
                    .thread_locking
                    .or(file_ingest.thread_locking)
                    .unwrap_or(true),
            },
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.database.backend == DatabaseBackend::Postgres && self.database.postgres.is_none() {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when database.backend is 'postgres'"
            );
        }

        if self.ingest.max_batch_events == 0 {
            anyhow::bail!("Configuration error: ingest.max_batch_events must be greater than 0");
        }

        if !self.ingest.thread_locking {
            tracing::warn!(
                "ingest.thread_locking is disabled, concurrent messages of one thread may race"
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.runweave/runweave.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(json: &str) -> FileConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_database_backend_serde() {
        let backend: DatabaseBackend = serde_json::from_str(r#""postgres""#).unwrap();
        assert_eq!(backend, DatabaseBackend::Postgres);
        assert_eq!(DatabaseBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_file_config_parse_full() {
        let config = parse(
            r#"{
                "server": { "host": "0.0.0.0", "port": 8080 },
                "otel": { "enabled": false },
                "database": { "backend": "postgres", "postgres": { "url": "postgres://db/runs", "max_connections": 5 } },
                "ingest": { "max_batch_events": 50, "thread_locking": false }
            }"#,
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(8080));
        assert_eq!(config.otel.as_ref().unwrap().enabled, Some(false));
        let database = config.database.as_ref().unwrap();
        assert_eq!(database.backend, Some(DatabaseBackend::Postgres));
        assert_eq!(database.postgres.as_ref().unwrap().max_connections, Some(5));
        assert_eq!(config.ingest.as_ref().unwrap().max_batch_events, Some(50));
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let config = parse(r#"{ "server": { "host": "localhost" }, "sevrer": 1 }"#);
        assert_eq!(config.unknown_fields(), vec!["sevrer"]);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = parse(
            r#"{ "server": { "host": "base", "port": 1000 }, "database": { "postgres": { "url": "postgres://a", "min_connections": 1 } } }"#,
        );
        let overlay = parse(
            r#"{ "server": { "port": 2000 }, "database": { "postgres": { "url": "postgres://b" } }, "ingest": { "thread_locking": false } }"#,
        );
        base.merge(overlay);

        let server = base.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("base"));
        assert_eq!(server.port, Some(2000));
        let pg = base.database.as_ref().unwrap().postgres.as_ref().unwrap();
        assert_eq!(pg.url.as_deref(), Some("postgres://b"));
        assert_eq!(pg.min_connections, Some(1));
        assert_eq!(base.ingest.as_ref().unwrap().thread_locking, Some(false));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = AppConfig::resolve(FileConfig::default(), &CliConfig::default());
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.otel.enabled);
        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert!(config.database.postgres.is_none());
        assert_eq!(config.ingest.max_batch_events, DEFAULT_MAX_BATCH_EVENTS);
        assert!(config.ingest.thread_locking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let file = parse(
            r#"{ "server": { "port": 1000 }, "database": { "postgres": { "url": "postgres://file", "max_connections": 7 } } }"#,
        );
        let cli = CliConfig {
            port: Some(3000),
            database_backend: Some(DatabaseBackend::Postgres),
            postgres_url: Some("postgres://cli".to_string()),
            ..Default::default()
        };
        let config = AppConfig::resolve(file, &cli);

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        let pg = config.database.postgres.as_ref().unwrap();
        assert_eq!(pg.url, "postgres://cli");
        assert_eq!(pg.max_connections, 7);
        assert_eq!(pg.statement_timeout_secs, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS);
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validation_postgres_requires_url() {
        let cli = CliConfig {
            database_backend: Some(DatabaseBackend::Postgres),
            ..Default::default()
        };
        let err = AppConfig::resolve(FileConfig::default(), &cli)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("database.postgres.url"));
    }

    #[test]
    fn test_validation_port_zero() {
        let cli = CliConfig {
            port: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::resolve(FileConfig::default(), &cli).validate().is_err());
    }

    #[test]
    fn test_validation_empty_host() {
        let cli = CliConfig {
            host: Some(String::new()),
            ..Default::default()
        };
        assert!(AppConfig::resolve(FileConfig::default(), &cli).validate().is_err());
    }

    #[test]
    fn test_validation_zero_batch() {
        let cli = CliConfig {
            max_batch_events: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::resolve(FileConfig::default(), &cli).validate().is_err());
    }

    // ========================================================================
    // Loading from disk
    // ========================================================================

    #[test]
    fn test_load_explicit_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "server": {{ "port": 4242 }}, "ingest": {{ "max_batch_events": 10 }} }}"#
        )
        .unwrap();

        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 4242);
        assert_eq!(config.ingest.max_batch_events, 10);
    }

    #[test]
    fn test_load_missing_config_file() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/runweave.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/etc/runweave.json"), PathBuf::from("/etc/runweave.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x.json"), home.join("x.json"));
        }
    }

    #[test]
    fn test_postgres_url_not_serialized() {
        let config = AppConfig::resolve(
            FileConfig::default(),
            &CliConfig {
                postgres_url: Some("postgres://user:secret@db/runs".to_string()),
                ..Default::default()
            },
        );
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
