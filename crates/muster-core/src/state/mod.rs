//! Task state machine transitions.
//!
//! Validates and executes state transitions for tasks, enforcing the
//! allowed transition graph and optimistic locking.
//!
//! ```text
//! queued  -> running                 (dispatcher, lease-gated)
//! running -> done                    (run lifecycle, success)
//! running -> failed                  (run lifecycle, non-retryable failure)
//! running -> queued                  (run lifecycle retry, or sweeper orphan recovery)
//! running -> blocked                 (run lifecycle, awaiting judge)
//! running -> cancelled               (run lifecycle, cancellation)
//! blocked -> done                    (judge approval, or sweeper auto-approve fallback)
//! blocked -> failed                  (judge rejection)
//! ```

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use muster_db::models::TaskStatus;
use muster_db::queries::tasks as db;

/// Whether `from -> to` is a legal edge in the task status graph.
pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (TaskStatus::Queued, TaskStatus::Running)
            | (TaskStatus::Running, TaskStatus::Done)
            | (TaskStatus::Running, TaskStatus::Failed)
            | (TaskStatus::Running, TaskStatus::Queued)
            | (TaskStatus::Running, TaskStatus::Blocked)
            | (TaskStatus::Running, TaskStatus::Cancelled)
            | (TaskStatus::Blocked, TaskStatus::Done)
            | (TaskStatus::Blocked, TaskStatus::Failed)
    )
}

/// Execute a conditional transition, distinguishing "task missing" from
/// "optimistic lock failure" (current status does not match `from`) on a
/// zero-row update, mirroring the teacher's `TaskStateMachine::transition`.
pub async fn transition(pool: &PgPool, task_id: Uuid, from: TaskStatus, to: TaskStatus) -> Result<()> {
    if !is_valid_transition(from, to) {
        bail!("invalid state transition: {from} -> {to} for task {task_id}");
    }

    let rows = db::transition_status(pool, task_id, from, to)
        .await
        .with_context(|| format!("failed to transition task {task_id} from {from} to {to}"))?;

    if rows == 0 {
        let task = db::get_task(pool, task_id).await?;
        match task {
            None => bail!("task {task_id} not found"),
            Some(t) => bail!(
                "optimistic lock failed: task {task_id} has status {}, expected {from}",
                t.status
            ),
        }
    }

    Ok(())
}

/// Validate that all dependencies of a task are `done`. Used by the
/// dispatcher's readiness check (though `get_ready_tasks` already filters
/// for this in SQL; this is the in-process equivalent for callers that
/// already hold a specific task and want to double check before claiming).
pub async fn check_dependencies(pool: &PgPool, task_id: Uuid) -> Result<()> {
    let dep_ids = db::get_task_dependencies(pool, task_id).await?;

    for dep_id in dep_ids {
        let dep = db::get_task(pool, dep_id)
            .await?
            .with_context(|| format!("dependency task {dep_id} not found"))?;

        if dep.status != TaskStatus::Done {
            bail!(
                "dependency {dep_id} for task {task_id} has status {}, expected done",
                dep.status
            );
        }
    }

    Ok(())
}
