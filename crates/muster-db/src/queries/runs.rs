//! Database query functions for the `runs` table.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Run, RunStatus};

/// Insert a new run row in `running` status.
pub async fn insert_run(pool: &PgPool, task_id: Uuid, agent_id: &str) -> Result<Run> {
    let run = sqlx::query_as::<_, Run>(
        "INSERT INTO runs (task_id, agent_id) VALUES ($1, $2) RETURNING *",
    )
    .bind(task_id)
    .bind(agent_id)
    .fetch_one(pool)
    .await
    .context("failed to insert run")?;

    Ok(run)
}

/// Fetch a single run by id.
pub async fn get_run(pool: &PgPool, id: Uuid) -> Result<Option<Run>> {
    let run = sqlx::query_as::<_, Run>("SELECT * FROM runs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch run")?;

    Ok(run)
}

/// List all runs for a task, most recent first.
pub async fn list_runs_for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Run>> {
    let runs = sqlx::query_as::<_, Run>(
        "SELECT * FROM runs WHERE task_id = $1 ORDER BY started_at DESC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
    .context("failed to list runs for task")?;

    Ok(runs)
}

/// Whether a task currently has a run with `status = 'running'`.
pub async fn has_active_run(pool: &PgPool, task_id: Uuid) -> Result<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM runs WHERE task_id = $1 AND status = 'running'",
    )
    .bind(task_id)
    .fetch_one(pool)
    .await
    .context("failed to check for active run")?;

    Ok(row.0 > 0)
}

/// Whether an agent currently owns a run with `status = 'running'`.
pub async fn agent_has_running_run(pool: &PgPool, agent_id: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM runs WHERE agent_id = $1 AND status = 'running'",
    )
    .bind(agent_id)
    .fetch_one(pool)
    .await
    .context("failed to check agent running run")?;

    Ok(row.0 > 0)
}

/// Count runs with `status = 'running'` for a task (used by property
/// tests verifying invariant 1 and 3).
pub async fn count_running_for_task(pool: &PgPool, task_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM runs WHERE task_id = $1 AND status = 'running'",
    )
    .bind(task_id)
    .fetch_one(pool)
    .await
    .context("failed to count running runs for task")?;

    Ok(row.0)
}

/// Write a run's terminal outcome. Conditional on the run currently being
/// `running`, so a terminal run status never regresses to `running`
/// (invariant 6), and a doubled completion report is a harmless no-op.
pub async fn complete_run(
    pool: &PgPool,
    run_id: Uuid,
    outcome: RunStatus,
    error_message: Option<&str>,
    error_meta: Option<&Value>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE runs \
         SET status = $1, finished_at = now(), error_message = $2, error_meta = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(outcome)
    .bind(error_message)
    .bind(error_meta)
    .bind(run_id)
    .execute(pool)
    .await
    .context("failed to complete run")?;

    Ok(result.rows_affected())
}
