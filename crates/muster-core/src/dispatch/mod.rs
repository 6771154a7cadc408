//! Dispatcher: pairs ready tasks with idle agents via the lease manager,
//! then creates the run and flips the task/agent records.
//!
//! The four writes (lease, run, task, agent) are strictly ordered so that
//! any crash between steps leaves a state recoverable by sweeper passes
//! B or C. No step before lease acquisition is allowed to run on a task
//! the caller has not yet won.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use muster_db::models::TaskStatus;
use muster_db::queries::{agents, tasks};

use crate::lease::{self, AcquireOutcome};
use crate::state;

/// A task successfully claimed and started for an agent.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOutcome {
    pub task_id: Uuid,
    pub run_id: Uuid,
    pub lease_id: Uuid,
}

/// Attempt to dispatch a single specific `task_id` to `agent_id`. Returns
/// `Ok(None)` if the lease was already held by another claimant (a lost
/// race, not an error); `Ok(Some(outcome))` on success.
pub async fn dispatch_one(
    pool: &PgPool,
    task_id: Uuid,
    agent_id: &str,
    lease_duration_minutes: i64,
    now: DateTime<Utc>,
) -> Result<Option<DispatchOutcome>> {
    let acquired = lease::acquire(pool, task_id, agent_id, lease_duration_minutes, now).await?;

    let lease_id = match acquired {
        AcquireOutcome::AlreadyHeld => return Ok(None),
        AcquireOutcome::Acquired(id) => id,
    };

    let run = muster_db::queries::runs::insert_run(pool, task_id, agent_id)
        .await
        .context("failed to create run after acquiring lease")?;

    state::transition(pool, task_id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .context("failed to transition task to running after acquiring lease")?;

    agents::mark_busy(pool, agent_id, task_id)
        .await
        .context("failed to mark agent busy after dispatch")?;

    info!(
        task_id = %task_id,
        agent_id,
        run_id = %run.id,
        lease_id = %lease_id,
        "dispatched task to agent"
    );

    Ok(Some(DispatchOutcome {
        task_id,
        run_id: run.id,
        lease_id,
    }))
}

/// One dispatch cycle: pick the highest-priority ready task and the first
/// idle agent, and try to bind them. Tries subsequent ready tasks if a
/// claim is lost to a concurrent dispatcher, up to `max_candidates`.
/// Returns `None` if there is no idle agent or no task could be claimed.
pub async fn dispatch_once(
    pool: &PgPool,
    lease_duration_minutes: i64,
    max_candidates: i64,
    now: DateTime<Utc>,
) -> Result<Option<DispatchOutcome>> {
    let idle_agents = agents::list_idle_agents(pool)
        .await
        .context("failed to list idle agents")?;
    let Some(agent) = idle_agents.first() else {
        return Ok(None);
    };

    let candidates = tasks::get_ready_tasks(pool, max_candidates)
        .await
        .context("failed to list ready tasks")?;

    for task in candidates {
        if let Some(outcome) =
            dispatch_one(pool, task.id, &agent.id, lease_duration_minutes, now).await?
        {
            return Ok(Some(outcome));
        }
    }

    Ok(None)
}
