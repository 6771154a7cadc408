//! Database query functions for the `tasks` and `task_dependencies` tables.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Task, TaskStatus};

/// Input for creating a new task. Mirrors the Task schema referenced by
/// the planner's `createTask` boundary operation.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub goal: String,
    pub kind: String,
    pub priority: i32,
    pub risk_level: String,
    pub allowed_paths: Vec<String>,
    pub commands: Vec<String>,
    pub timebox_minutes: i32,
}

/// Insert a new task row. Returns the inserted task with server-generated
/// defaults (id, status=queued, retry_count=0, timestamps).
pub async fn insert_task(pool: &PgPool, input: &NewTask) -> Result<Task> {
    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks \
            (title, goal, kind, priority, risk_level, allowed_paths, commands, timebox_minutes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(&input.title)
    .bind(&input.goal)
    .bind(&input.kind)
    .bind(input.priority)
    .bind(&input.risk_level)
    .bind(&input.allowed_paths)
    .bind(&input.commands)
    .bind(input.timebox_minutes)
    .fetch_one(pool)
    .await
    .context("failed to insert task")?;

    Ok(task)
}

/// Fetch a single task by id.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// List all tasks, ordered by creation time.
pub async fn list_tasks(pool: &PgPool) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at ASC")
        .fetch_all(pool)
        .await
        .context("failed to list tasks")?;

    Ok(tasks)
}

/// Insert a dependency edge: `task_id` depends on `depends_on`.
///
/// Uses `ON CONFLICT DO NOTHING` so this is idempotent.
pub async fn insert_task_dependency(pool: &PgPool, task_id: Uuid, depends_on: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO task_dependencies (task_id, depends_on) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(task_id)
    .bind(depends_on)
    .execute(pool)
    .await
    .context("failed to insert task dependency")?;

    Ok(())
}

/// Get the ids of all tasks that a given task depends on.
pub async fn get_task_dependencies(pool: &PgPool, task_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT depends_on FROM task_dependencies WHERE task_id = $1")
            .bind(task_id)
            .fetch_all(pool)
            .await
            .context("failed to get task dependencies")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Select the highest-priority `queued` tasks whose dependencies (if any)
/// are all `done`, ordered for dispatcher consumption.
pub async fn get_ready_tasks(pool: &PgPool, limit: i64) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT t.* \
         FROM tasks t \
         WHERE t.status = 'queued' \
           AND NOT EXISTS ( \
               SELECT 1 FROM task_dependencies td \
               JOIN tasks dep ON dep.id = td.depends_on \
               WHERE td.task_id = t.id AND dep.status != 'done' \
           ) \
         ORDER BY t.priority DESC, t.created_at ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to get ready tasks")?;

    Ok(tasks)
}

/// Atomically transition a task's status, conditional on its current
/// status matching `from`. Always touches `updated_at`. Returns the
/// number of rows affected (0 means the status did not match `from` or
/// the task does not exist).
pub async fn transition_status(
    pool: &PgPool,
    task_id: Uuid,
    from: TaskStatus,
    to: TaskStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks SET status = $1, updated_at = now() WHERE id = $2 AND status = $3",
    )
    .bind(to)
    .bind(task_id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition task status")?;

    Ok(result.rows_affected())
}

/// Transition a task to `done`, clearing `block_reason`. Used by the run
/// lifecycle on success and by sweeper pass D's auto-approve fallback.
pub async fn complete(pool: &PgPool, task_id: Uuid, from: TaskStatus) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks SET status = 'done', block_reason = NULL, updated_at = now() \
         WHERE id = $1 AND status = $2",
    )
    .bind(task_id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to complete task")?;

    Ok(result.rows_affected())
}

/// Transition a task back to `queued` and increment `retry_count`,
/// clearing `block_reason`. Used by the run lifecycle on a retryable
/// failure and by sweeper passes A/C on orphan recovery (where the
/// retry count is left untouched -- see [`requeue_without_retry`]).
pub async fn requeue_with_retry(pool: &PgPool, task_id: Uuid, from: TaskStatus) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks \
         SET status = 'queued', retry_count = retry_count + 1, block_reason = NULL, \
             updated_at = now() \
         WHERE id = $1 AND status = $2",
    )
    .bind(task_id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to requeue task with retry")?;

    Ok(result.rows_affected())
}

/// Transition a task back to `queued` without touching `retry_count`.
/// Used by the recovery sweeper, which is repairing a dangling state, not
/// counting a failed attempt.
pub async fn requeue_without_retry(pool: &PgPool, task_id: Uuid, from: TaskStatus) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks SET status = 'queued', block_reason = NULL, updated_at = now() \
         WHERE id = $1 AND status = $2",
    )
    .bind(task_id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to requeue task")?;

    Ok(result.rows_affected())
}

/// Transition a task to `failed` (terminal).
pub async fn fail(pool: &PgPool, task_id: Uuid, from: TaskStatus) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks SET status = 'failed', updated_at = now() WHERE id = $1 AND status = $2",
    )
    .bind(task_id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to fail task")?;

    Ok(result.rows_affected())
}

/// Block a task pending judge approval.
pub async fn block_awaiting_judge(pool: &PgPool, task_id: Uuid, from: TaskStatus) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks \
         SET status = 'blocked', block_reason = 'awaiting_judge', updated_at = now() \
         WHERE id = $1 AND status = $2",
    )
    .bind(task_id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to block task awaiting judge")?;

    Ok(result.rows_affected())
}

/// List up to `limit` tasks stuck in `blocked`/`awaiting_judge`, oldest
/// first. Used by sweeper pass D.
pub async fn list_awaiting_judge(pool: &PgPool, limit: i64) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE status = 'blocked' AND block_reason = 'awaiting_judge' \
         ORDER BY updated_at ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list tasks awaiting judge")?;

    Ok(tasks)
}

/// List tasks whose `status = 'running'` and `updated_at` is older than
/// `older_than`. Used by sweeper pass C to find orphaned running tasks.
pub async fn list_stale_running(
    pool: &PgPool,
    older_than: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE status = 'running' AND updated_at < $1",
    )
    .bind(older_than)
    .fetch_all(pool)
    .await
    .context("failed to list stale running tasks")?;

    Ok(tasks)
}
