use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::DatabaseBackend;
use super::constants::{
    ENV_CONFIG, ENV_DATABASE_BACKEND, ENV_HOST, ENV_MAX_BATCH_EVENTS, ENV_OTEL_ENABLED, ENV_PORT,
    ENV_POSTGRES_URL, ENV_THREAD_LOCKING,
};

#[derive(Parser)]
#[command(name = "runweave")]
#[command(version, about = "LLM run ingestion server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable or disable the OTLP trace endpoint
    #[arg(long, global = true, env = ENV_OTEL_ENABLED)]
    pub otel: Option<bool>,

    /// Run store backend (memory or postgres)
    #[arg(long, global = true, env = ENV_DATABASE_BACKEND, value_parser = parse_database_backend)]
    pub database_backend: Option<DatabaseBackend>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    /// Maximum events accepted per ingest request
    #[arg(long, global = true, env = ENV_MAX_BATCH_EVENTS)]
    pub max_batch_events: Option<usize>,

    /// Serialize chat messages of the same thread
    #[arg(long, global = true, env = ENV_THREAD_LOCKING)]
    pub thread_locking: Option<bool>,
}

/// Parse run store backend from CLI/env string
fn parse_database_backend(s: &str) -> Result<DatabaseBackend, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(DatabaseBackend::Memory),
        "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
        _ => Err(format!(
            "Invalid database backend '{}'. Valid options: memory, postgres",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Print the merged configuration and exit
    Config,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub otel: Option<bool>,
    pub database_backend: Option<DatabaseBackend>,
    pub postgres_url: Option<String>,
    pub max_batch_events: Option<usize>,
    pub thread_locking: Option<bool>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        otel: cli.otel,
        database_backend: cli.database_backend,
        postgres_url: cli.postgres_url,
        max_batch_events: cli.max_batch_events,
        thread_locking: cli.thread_locking,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_database_backend() {
        assert_eq!(parse_database_backend("memory"), Ok(DatabaseBackend::Memory));
        assert_eq!(parse_database_backend("PostgreSQL"), Ok(DatabaseBackend::Postgres));
        assert!(parse_database_backend("sqlite").is_err());
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "runweave",
            "--port",
            "4000",
            "--database-backend",
            "postgres",
            "--thread-locking",
            "false",
            "start",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(4000));
        assert_eq!(cli.database_backend, Some(DatabaseBackend::Postgres));
        assert_eq!(cli.thread_locking, Some(false));
        assert!(matches!(cli.command, Some(Commands::Start)));
    }
}
