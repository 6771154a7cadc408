//! Lease manager: acquire, release, extend, and inspect leases, keeping
//! agent status consistent with outstanding work via `reconcile_agent`.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use muster_db::queries::{agents, leases, runs};

/// Outcome of [`acquire`]. `AlreadyHeld` is normal flow -- a concurrent
/// claimant won the race -- not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(Uuid),
    AlreadyHeld,
}

/// Claim `task_id` for `agent_id` for `duration_minutes` from `now`.
/// Relies on the `UNIQUE(task_id)` constraint on `leases`: the insert IS
/// the claim, with no read-then-write race window.
pub async fn acquire(
    pool: &PgPool,
    task_id: Uuid,
    agent_id: &str,
    duration_minutes: i64,
    now: DateTime<Utc>,
) -> Result<AcquireOutcome> {
    let expires_at = now + Duration::minutes(duration_minutes);
    let lease = leases::acquire(pool, task_id, agent_id, expires_at)
        .await
        .with_context(|| format!("failed to acquire lease for task {task_id}"))?;

    match lease {
        Some(lease) => {
            info!(task_id = %task_id, agent_id, lease_id = %lease.id, "lease acquired");
            Ok(AcquireOutcome::Acquired(lease.id))
        }
        None => {
            info!(task_id = %task_id, agent_id, "lease acquire lost race: already_held");
            Ok(AcquireOutcome::AlreadyHeld)
        }
    }
}

/// Release the lease for a task (if any) and reconcile the owning agent
/// back to idle if it now holds no work.
pub async fn release(pool: &PgPool, task_id: Uuid) -> Result<()> {
    let existing = leases::get_for_task(pool, task_id).await?;
    let agent_id = existing.map(|l| l.agent_id);

    leases::delete_for_task(pool, task_id)
        .await
        .with_context(|| format!("failed to release lease for task {task_id}"))?;
    info!(task_id = %task_id, "lease released");

    if let Some(agent_id) = agent_id {
        reconcile_agent(pool, &agent_id).await?;
    }

    Ok(())
}

/// Push a lease's expiry out by `additional_minutes` from `now`. Does not
/// check the current expiry -- preserved intentionally so a worker can
/// reclaim a lease it still believes it owns.
pub async fn extend(
    pool: &PgPool,
    task_id: Uuid,
    additional_minutes: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let new_expiry = now + Duration::minutes(additional_minutes);
    let rows = leases::extend(pool, task_id, new_expiry)
        .await
        .with_context(|| format!("failed to extend lease for task {task_id}"))?;
    Ok(rows > 0)
}

/// All leases not yet expired as of `now`.
pub async fn get_active_leases(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<muster_db::models::Lease>> {
    leases::get_active(pool, now)
        .await
        .context("failed to list active leases")
}

/// If `agent_id` holds no leases and owns no running run, demote it to
/// `idle` and clear `current_task_id`. The canonical way to return an
/// agent to the pool; must be called after every release path.
pub async fn reconcile_agent(pool: &PgPool, agent_id: &str) -> Result<()> {
    let lease_count = leases::count_for_agent(pool, agent_id).await?;
    let has_running_run = runs::agent_has_running_run(pool, agent_id).await?;

    if lease_count == 0 && !has_running_run {
        agents::mark_idle(pool, agent_id)
            .await
            .with_context(|| format!("failed to reconcile agent {agent_id} to idle"))?;
        info!(agent_id, "agent reconciled to idle");
    }

    Ok(())
}
