//! Boundary collaborator stubs: the four public operations external
//! collaborators call into the core. Each validates input shape and
//! delegates to the state machine / lease manager / run lifecycle; none
//! carries logic belonging to the collaborator itself (planner task
//! generation, worker repo steps, judge approval policy).

use anyhow::{Context, Result, bail};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use muster_db::models::{ArtifactType, RunStatus, TaskStatus};
use muster_db::queries::tasks::NewTask;
use muster_db::queries::{artifacts, runs, tasks};

use crate::classify;
use crate::lease;
use crate::retry;
use crate::state;

/// Outcome reported back to the caller of [`complete_run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed,
    Cancelled,
}

/// Planner -> core: create a new task from validated input.
pub async fn create_task(pool: &PgPool, input: NewTask) -> Result<muster_db::models::Task> {
    if input.title.trim().is_empty() {
        bail!("task title must not be empty");
    }
    if input.timebox_minutes <= 0 {
        bail!("task timebox_minutes must be positive");
    }

    tasks::insert_task(pool, &input)
        .await
        .context("failed to create task")
}

/// Worker -> core: run lifecycle completion. `outcome` is one of
/// success | failed | cancelled. All transitions are conditional on the
/// current expected status so a lost race against the sweeper is a
/// harmless no-op rather than an error.
pub async fn complete_run(
    pool: &PgPool,
    run_id: Uuid,
    outcome: RunOutcome,
    error_message: Option<&str>,
    error_meta: Option<&Value>,
    global_retry_budget: i32,
) -> Result<()> {
    let run = runs::get_run(pool, run_id)
        .await?
        .with_context(|| format!("run {run_id} not found"))?;

    let run_status = match outcome {
        RunOutcome::Success => RunStatus::Success,
        RunOutcome::Failed => RunStatus::Failed,
        RunOutcome::Cancelled => RunStatus::Cancelled,
    };

    runs::complete_run(pool, run_id, run_status, error_message, error_meta)
        .await
        .with_context(|| format!("failed to write terminal state for run {run_id}"))?;

    match outcome {
        RunOutcome::Success => {
            tasks::complete(pool, run.task_id, TaskStatus::Running).await?;
            lease::release(pool, run.task_id).await?;
        }
        RunOutcome::Failed => {
            let message = error_message.unwrap_or_default();
            let classification = classify::classify(message, error_meta);
            let task = tasks::get_task(pool, run.task_id)
                .await?
                .with_context(|| format!("task {} not found", run.task_id))?;

            let limit = retry::resolve_retry_limit(classification.category, global_retry_budget);
            let under_cap = (task.retry_count as u32) < limit;

            if classification.retryable && under_cap {
                tasks::requeue_with_retry(pool, run.task_id, TaskStatus::Running).await?;
            } else {
                tasks::fail(pool, run.task_id, TaskStatus::Running).await?;
            }
            lease::release(pool, run.task_id).await?;
        }
        RunOutcome::Cancelled => {
            state::transition(pool, run.task_id, TaskStatus::Running, TaskStatus::Cancelled).await?;
            lease::release(pool, run.task_id).await?;
        }
    }

    Ok(())
}

/// Worker -> core: record an artifact produced by a run.
pub async fn record_artifact(
    pool: &PgPool,
    run_id: Uuid,
    artifact_type: ArtifactType,
    ref_: Option<&str>,
    url: Option<&str>,
    metadata: Option<&Value>,
) -> Result<muster_db::models::Artifact> {
    artifacts::insert_artifact(pool, run_id, artifact_type, ref_, url, metadata)
        .await
        .context("failed to record artifact")
}

/// Judge -> core: resolve a task blocked `awaiting_judge`.
pub async fn complete_task(pool: &PgPool, task_id: Uuid, approved: bool) -> Result<()> {
    let to = if approved {
        TaskStatus::Done
    } else {
        TaskStatus::Failed
    };
    state::transition(pool, task_id, TaskStatus::Blocked, to).await
}
