//! Recovery sweeper: four independent, idempotent passes that repair
//! dangling invariants left behind by crashed agents or lost races. Each
//! pass is safe to retry and safe to run concurrently with dispatcher or
//! worker activity, since every write is conditional on the status the
//! caller expects.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;

use muster_db::models::TaskStatus;
use muster_db::queries::{leases, runs, tasks};

use crate::lease;

/// Pass A -- expired leases. For each lease past its deadline: if the
/// task is still `running`, requeue it; delete the lease; reconcile the
/// owning agent. Returns the number of leases processed.
pub async fn sweep_expired_leases(pool: &PgPool, now: DateTime<Utc>) -> Result<u64> {
    let expired = leases::get_expired(pool, now)
        .await
        .context("failed to list expired leases")?;

    let mut count = 0u64;
    for lease in &expired {
        tasks::requeue_without_retry(pool, lease.task_id, TaskStatus::Running)
            .await
            .with_context(|| format!("failed to requeue task {} on lease expiry", lease.task_id))?;

        leases::delete_by_id(pool, lease.id)
            .await
            .with_context(|| format!("failed to delete expired lease {}", lease.id))?;

        lease::reconcile_agent(pool, &lease.agent_id).await?;

        info!(task_id = %lease.task_id, lease_id = %lease.id, "sweeper pass A: expired lease reclaimed");
        count += 1;
    }

    Ok(count)
}

/// Pass B -- dangling leases. A lease is dangling if its task no longer
/// exists, or the task is `queued` with no active run (the worker
/// crashed between lease acquisition and run creation).
pub async fn sweep_dangling_leases(pool: &PgPool) -> Result<u64> {
    let all = leases::get_all(pool).await.context("failed to list leases")?;

    let mut count = 0u64;
    for lease in &all {
        let task = tasks::get_task(pool, lease.task_id).await?;

        let dangling = match &task {
            None => true,
            Some(t) => {
                t.status == TaskStatus::Queued && !runs::has_active_run(pool, t.id).await?
            }
        };

        if dangling {
            leases::delete_by_id(pool, lease.id)
                .await
                .with_context(|| format!("failed to delete dangling lease {}", lease.id))?;
            lease::reconcile_agent(pool, &lease.agent_id).await?;
            info!(task_id = %lease.task_id, lease_id = %lease.id, "sweeper pass B: dangling lease removed");
            count += 1;
        }
    }

    Ok(count)
}

/// Pass C -- orphaned running tasks. A task stuck `running` with
/// `updated_at` older than `grace_ms` and no active run had its run
/// terminalized without the corresponding task transition. Requeue it,
/// clear any leftover lease, and reconcile affected agents.
pub async fn sweep_orphaned_running_tasks(pool: &PgPool, grace_ms: i64, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = now - Duration::milliseconds(grace_ms);
    let stale = tasks::list_stale_running(pool, cutoff)
        .await
        .context("failed to list stale running tasks")?;

    let mut count = 0u64;
    for task in &stale {
        if runs::has_active_run(pool, task.id).await? {
            continue;
        }

        if let Some(lease) = leases::get_for_task(pool, task.id).await? {
            leases::delete_by_id(pool, lease.id).await?;
            lease::reconcile_agent(pool, &lease.agent_id).await?;
        }

        tasks::requeue_without_retry(pool, task.id, TaskStatus::Running)
            .await
            .with_context(|| format!("failed to requeue orphaned task {}", task.id))?;

        info!(task_id = %task.id, "sweeper pass C: orphaned running task recovered");
        count += 1;
    }

    Ok(count)
}

/// Pass D -- stuck-in-judge fallback. Only runs when `direct_mode_auto_approve`
/// is set; otherwise a no-op. Not the primary judge path -- kept gated on
/// an explicit mode flag.
pub async fn sweep_stuck_in_judge(
    pool: &PgPool,
    direct_mode_auto_approve: bool,
    limit: i64,
) -> Result<u64> {
    if !direct_mode_auto_approve {
        return Ok(0);
    }

    let stuck = tasks::list_awaiting_judge(pool, limit)
        .await
        .context("failed to list tasks awaiting judge")?;

    let mut count = 0u64;
    for task in &stuck {
        let rows = tasks::complete(pool, task.id, TaskStatus::Blocked)
            .await
            .with_context(|| format!("failed to auto-approve task {}", task.id))?;
        if rows > 0 {
            info!(task_id = %task.id, "sweeper pass D: auto-approved stuck-in-judge task");
            count += 1;
        }
    }

    Ok(count)
}

/// Run all four passes once. Ordering across passes is not required for
/// correctness; each restores an independent invariant.
pub struct SweepReport {
    pub expired_leases: u64,
    pub dangling_leases: u64,
    pub orphaned_running_tasks: u64,
    pub auto_approved: u64,
}

pub async fn sweep_once(
    pool: &PgPool,
    grace_ms: i64,
    direct_mode_auto_approve: bool,
    judge_fallback_limit: i64,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let expired_leases = sweep_expired_leases(pool, now).await?;
    let dangling_leases = sweep_dangling_leases(pool).await?;
    let orphaned_running_tasks = sweep_orphaned_running_tasks(pool, grace_ms, now).await?;
    let auto_approved =
        sweep_stuck_in_judge(pool, direct_mode_auto_approve, judge_fallback_limit).await?;

    Ok(SweepReport {
        expired_leases,
        dangling_leases,
        orphaned_running_tasks,
        auto_approved,
    })
}
