// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "runweave";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".runweave";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "runweave.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "RUNWEAVE_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "RUNWEAVE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "RUNWEAVE_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "RUNWEAVE_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 3333;

/// Default log filter when neither RUNWEAVE_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,runweave_server=info,tower_http=warn";

// =============================================================================
// HTTP Limits
// =============================================================================

/// Body limit for tracking event batches (8MB)
pub const INGEST_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Body limit for OTLP exports (64MB)
pub const OTLP_BODY_LIMIT: usize = 64 * 1024 * 1024;

// =============================================================================
// Ingestion
// =============================================================================

/// Environment variable for the per-request event limit
pub const ENV_MAX_BATCH_EVENTS: &str = "RUNWEAVE_MAX_BATCH_EVENTS";

/// Environment variable to toggle per-thread locking
pub const ENV_THREAD_LOCKING: &str = "RUNWEAVE_THREAD_LOCKING";

/// Maximum events accepted in one ingest request
pub const DEFAULT_MAX_BATCH_EVENTS: usize = 1000;

/// Environment variable to enable or disable the OTLP endpoint
pub const ENV_OTEL_ENABLED: &str = "RUNWEAVE_OTEL_ENABLED";

// =============================================================================
// Shutdown
// =============================================================================

/// Max seconds to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Run Store
// =============================================================================

/// Environment variable for the run store backend (memory or postgres)
pub const ENV_DATABASE_BACKEND: &str = "RUNWEAVE_DATABASE_BACKEND";

/// Environment variable for the PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "RUNWEAVE_POSTGRES_URL";

/// PostgreSQL pool max connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL pool warm connections
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Seconds to wait for a pooled connection
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Idle connections are closed after this many seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Connections are recycled after this many seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Per-statement timeout in seconds (0 disables)
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

/// Interval between PostgreSQL health pings
pub const POSTGRES_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
