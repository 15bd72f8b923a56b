//! PostgreSQL schema definitions

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

-- =============================================================================
-- Runs: LLM calls, chains, tools, chat exchanges and thread containers
-- =============================================================================
-- parent_run_id and sibling_of carry no foreign keys: events arrive out of
-- order and a child may be written before its parent.
CREATE TABLE IF NOT EXISTS run (
    id UUID PRIMARY KEY,
    app TEXT NOT NULL,
    type TEXT NOT NULL,
    name TEXT,
    status TEXT,
    input JSONB,
    output JSONB,
    error JSONB,
    params JSONB,
    metadata JSONB,
    tags TEXT[],
    user_id TEXT,
    feedback JSONB,
    parent_run_id UUID,
    sibling_of UUID,
    prompt_tokens BIGINT,
    completion_tokens BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    ended_at TIMESTAMPTZ,
    seq BIGSERIAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_run_app_parent_created
    ON run (app, parent_run_id, created_at DESC, seq DESC);
CREATE INDEX IF NOT EXISTS idx_run_app_created ON run (app, created_at DESC);
"#;
