//! Run repository for PostgreSQL operations
//!
//! Inserts write only the columns that carry a value and updates touch only
//! the columns whose patch is not `Keep`, so absent fields never overwrite
//! stored data with NULL.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::data::postgres::PostgresError;
use crate::data::types::{Patch, RunInsert, RunRow, RunStatus, RunType, RunUpdate, ThreadUpsert};

const RUN_COLUMNS: &str = "id, app, type, name, status, input, output, error, params, metadata, \
     tags, user_id, feedback, parent_run_id, sibling_of, prompt_tokens, completion_tokens, \
     created_at, ended_at";

// ============================================================================
// COLUMN VALUES
// ============================================================================

/// Owned bind value for a dynamically built statement.
#[derive(Debug, Clone, PartialEq)]
enum ColumnValue {
    Uuid(Uuid),
    Text(String),
    Json(JsonValue),
    Tags(Vec<String>),
    Int(i64),
    Time(DateTime<Utc>),
}

impl ColumnValue {
    fn push_bind(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Uuid(v) => qb.push_bind(v),
            Self::Text(v) => qb.push_bind(v),
            Self::Json(v) => qb.push_bind(v),
            Self::Tags(v) => qb.push_bind(v),
            Self::Int(v) => qb.push_bind(v),
            Self::Time(v) => qb.push_bind(v),
        };
    }
}

fn insert_columns(run: RunInsert) -> Vec<(&'static str, ColumnValue)> {
    let mut cols = vec![
        ("id", ColumnValue::Uuid(run.id)),
        ("app", ColumnValue::Text(run.app)),
        ("type", ColumnValue::Text(run.run_type.as_str().to_string())),
        ("created_at", ColumnValue::Time(run.created_at)),
    ];
    let optional = [
        ("name", run.name.map(ColumnValue::Text)),
        (
            "status",
            run.status.map(|s| ColumnValue::Text(s.as_str().to_string())),
        ),
        ("input", run.input.map(ColumnValue::Json)),
        ("output", run.output.map(ColumnValue::Json)),
        ("error", run.error.map(ColumnValue::Json)),
        ("params", run.params.map(ColumnValue::Json)),
        ("metadata", run.metadata.map(ColumnValue::Json)),
        ("tags", run.tags.map(ColumnValue::Tags)),
        ("user_id", run.user.map(ColumnValue::Text)),
        ("feedback", run.feedback.map(ColumnValue::Json)),
        ("parent_run_id", run.parent_run.map(ColumnValue::Uuid)),
        ("sibling_of", run.sibling_of.map(ColumnValue::Uuid)),
        ("prompt_tokens", run.prompt_tokens.map(ColumnValue::Int)),
        ("completion_tokens", run.completion_tokens.map(ColumnValue::Int)),
        ("ended_at", run.ended_at.map(ColumnValue::Time)),
    ];
    cols.extend(
        optional
            .into_iter()
            .filter_map(|(col, value)| value.map(|v| (col, v))),
    );
    cols
}

/// `(column, Some(value))` sets, `(column, None)` clears. `Keep` is skipped.
fn update_columns(changes: RunUpdate) -> Vec<(&'static str, Option<ColumnValue>)> {
    fn column<T>(
        col: &'static str,
        patch: Patch<T>,
        wrap: impl FnOnce(T) -> ColumnValue,
    ) -> Option<(&'static str, Option<ColumnValue>)> {
        (!patch.is_keep()).then(|| (col, patch.into_value().map(wrap)))
    }

    let rekey = changes.id.map(|id| ("id", Some(ColumnValue::Uuid(id))));
    [
        rekey,
        column("name", changes.name, ColumnValue::Text),
        column("status", changes.status, |s| {
            ColumnValue::Text(s.as_str().to_string())
        }),
        column("input", changes.input, ColumnValue::Json),
        column("output", changes.output, ColumnValue::Json),
        column("error", changes.error, ColumnValue::Json),
        column("params", changes.params, ColumnValue::Json),
        column("metadata", changes.metadata, ColumnValue::Json),
        column("tags", changes.tags, ColumnValue::Tags),
        column("user_id", changes.user, ColumnValue::Text),
        column("feedback", changes.feedback, ColumnValue::Json),
        column("prompt_tokens", changes.prompt_tokens, ColumnValue::Int),
        column("completion_tokens", changes.completion_tokens, ColumnValue::Int),
        column("ended_at", changes.ended_at, ColumnValue::Time),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn build_insert(run: RunInsert) -> QueryBuilder<'static, Postgres> {
    let cols = insert_columns(run);
    let mut qb = QueryBuilder::new("INSERT INTO run (");
    let names: Vec<&str> = cols.iter().map(|(c, _)| *c).collect();
    qb.push(names.join(", "));
    qb.push(") VALUES (");
    for (i, (_, value)) in cols.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        value.push_bind(&mut qb);
    }
    qb.push(")");
    qb
}

/// `None` when there is nothing to set.
fn build_update(app: &str, id: Uuid, changes: RunUpdate) -> Option<QueryBuilder<'static, Postgres>> {
    let cols = update_columns(changes);
    if cols.is_empty() {
        return None;
    }
    let mut qb = QueryBuilder::new("UPDATE run SET ");
    for (i, (col, value)) in cols.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(col);
        match value {
            Some(v) => {
                qb.push(" = ");
                v.push_bind(&mut qb);
            }
            None => {
                qb.push(" = NULL");
            }
        }
    }
    qb.push(" WHERE app = ");
    qb.push_bind(app.to_string());
    qb.push(" AND id = ");
    qb.push_bind(id);
    Some(qb)
}

// ============================================================================
// ROW DECODING
// ============================================================================

#[derive(sqlx::FromRow)]
struct RunRecord {
    id: Uuid,
    app: String,
    #[sqlx(rename = "type")]
    run_type: String,
    name: Option<String>,
    status: Option<String>,
    input: Option<JsonValue>,
    output: Option<JsonValue>,
    error: Option<JsonValue>,
    params: Option<JsonValue>,
    metadata: Option<JsonValue>,
    tags: Option<Vec<String>>,
    user_id: Option<String>,
    feedback: Option<JsonValue>,
    parent_run_id: Option<Uuid>,
    sibling_of: Option<Uuid>,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunRecord> for RunRow {
    type Error = PostgresError;

    fn try_from(r: RunRecord) -> Result<Self, Self::Error> {
        let run_type = RunType::parse(&r.run_type).ok_or_else(|| {
            PostgresError::Database(sqlx::Error::ColumnDecode {
                index: "type".to_string(),
                source: format!("unknown run type '{}'", r.run_type).into(),
            })
        })?;
        Ok(Self {
            id: r.id,
            app: r.app,
            run_type,
            name: r.name,
            status: r.status.as_deref().and_then(RunStatus::parse),
            input: r.input,
            output: r.output,
            error: r.error,
            params: r.params,
            metadata: r.metadata,
            tags: r.tags,
            user: r.user_id,
            feedback: r.feedback,
            parent_run: r.parent_run_id,
            sibling_of: r.sibling_of,
            prompt_tokens: r.prompt_tokens,
            completion_tokens: r.completion_tokens,
            created_at: r.created_at,
            ended_at: r.ended_at,
        })
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Insert a run; a duplicate id is a `Conflict`.
pub async fn insert_run(pool: &PgPool, run: RunInsert) -> Result<(), PostgresError> {
    let id = run.id;
    let mut qb = build_insert(run);
    qb.build()
        .execute(pool)
        .await
        .map_err(|e| PostgresError::from_write(e, || format!("run {} already exists", id)))?;
    Ok(())
}

/// Apply a partial update scoped to `app`.
pub async fn update_run(
    pool: &PgPool,
    app: &str,
    id: Uuid,
    changes: RunUpdate,
) -> Result<(), PostgresError> {
    let Some(mut qb) = build_update(app, id, changes) else {
        return match get_run(pool, app, id).await? {
            Some(_) => Ok(()),
            None => Err(PostgresError::NotFound(format!("run {}", id))),
        };
    };

    let result = qb
        .build()
        .execute(pool)
        .await
        .map_err(|e| PostgresError::from_write(e, || format!("run id taken while re-keying {}", id)))?;
    if result.rows_affected() == 0 {
        return Err(PostgresError::NotFound(format!("run {}", id)));
    }
    Ok(())
}

/// Insert a thread container or merge tags/user into the existing one.
pub async fn upsert_thread(pool: &PgPool, thread: ThreadUpsert) -> Result<(), PostgresError> {
    let id = thread.id;
    let result = sqlx::query(
        r#"
        INSERT INTO run (id, app, type, input, tags, user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            tags = COALESCE(EXCLUDED.tags, run.tags),
            user_id = COALESCE(EXCLUDED.user_id, run.user_id)
        WHERE run.app = EXCLUDED.app
        "#,
    )
    .bind(thread.id)
    .bind(&thread.app)
    .bind(RunType::Thread.as_str())
    .bind(thread.input)
    .bind(thread.tags)
    .bind(thread.user)
    .bind(thread.created_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PostgresError::Conflict(format!(
            "thread {} belongs to another app",
            id
        )));
    }
    Ok(())
}

/// Most recently created child of `parent_id`.
pub async fn latest_child_run(
    pool: &PgPool,
    app: &str,
    parent_id: Uuid,
) -> Result<Option<RunRow>, PostgresError> {
    let sql = format!(
        "SELECT {} FROM run WHERE app = $1 AND parent_run_id = $2 \
         ORDER BY created_at DESC, seq DESC LIMIT 1",
        RUN_COLUMNS
    );
    sqlx::query_as::<_, RunRecord>(&sql)
        .bind(app)
        .bind(parent_id)
        .fetch_optional(pool)
        .await?
        .map(RunRow::try_from)
        .transpose()
}

/// Get a run by id
pub async fn get_run(pool: &PgPool, app: &str, id: Uuid) -> Result<Option<RunRow>, PostgresError> {
    let sql = format!("SELECT {} FROM run WHERE app = $1 AND id = $2", RUN_COLUMNS);
    sqlx::query_as::<_, RunRecord>(&sql)
        .bind(app)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(RunRow::try_from)
        .transpose()
}
