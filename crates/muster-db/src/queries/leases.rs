//! Database query functions for the `leases` table.
//!
//! `task_id` is UNIQUE; every write here either relies on that constraint
//! directly (acquire) or is conditioned on the lease row identified by
//! `task_id` existing (extend, release). No function here reads before it
//! writes to decide whether to claim -- the insert IS the claim.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Lease;

/// Attempt to claim `task_id` for `agent_id` until `expires_at`.
///
/// Returns `Some(lease)` if this call won the race, `None` if a lease for
/// `task_id` already existed -- `already_held` is normal flow, not an
/// error.
pub async fn acquire(
    pool: &PgPool,
    task_id: Uuid,
    agent_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<Option<Lease>> {
    let lease = sqlx::query_as::<_, Lease>(
        "INSERT INTO leases (task_id, agent_id, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (task_id) DO NOTHING \
         RETURNING *",
    )
    .bind(task_id)
    .bind(agent_id)
    .bind(expires_at)
    .fetch_optional(pool)
    .await
    .context("failed to acquire lease")?;

    Ok(lease)
}

/// Fetch the lease for a task, if one exists.
pub async fn get_for_task(pool: &PgPool, task_id: Uuid) -> Result<Option<Lease>> {
    let lease = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE task_id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch lease for task")?;

    Ok(lease)
}

/// Delete the lease for a task, if any. Returns the number of rows
/// removed (0 or 1).
pub async fn delete_for_task(pool: &PgPool, task_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM leases WHERE task_id = $1")
        .bind(task_id)
        .execute(pool)
        .await
        .context("failed to delete lease for task")?;

    Ok(result.rows_affected())
}

/// Delete a lease by id. Used by sweeper passes that already hold the
/// full row.
pub async fn delete_by_id(pool: &PgPool, lease_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM leases WHERE id = $1")
        .bind(lease_id)
        .execute(pool)
        .await
        .context("failed to delete lease")?;

    Ok(result.rows_affected())
}

/// Extend a lease's expiry. Does not check the current expiry value --
/// preserved intentionally: a worker reclaiming a lease it still
/// believes it owns is allowed to push the deadline out even if a
/// sweeper has not yet reaped it.
pub async fn extend(
    pool: &PgPool,
    task_id: Uuid,
    new_expires_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query("UPDATE leases SET expires_at = $1 WHERE task_id = $2")
        .bind(new_expires_at)
        .bind(task_id)
        .execute(pool)
        .await
        .context("failed to extend lease")?;

    Ok(result.rows_affected())
}

/// All leases with `expires_at > now`.
pub async fn get_active(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Lease>> {
    let leases = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE expires_at > $1")
        .bind(now)
        .fetch_all(pool)
        .await
        .context("failed to get active leases")?;

    Ok(leases)
}

/// All leases with `expires_at < now`. Used by sweeper pass A.
pub async fn get_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Lease>> {
    let leases = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE expires_at < $1")
        .bind(now)
        .fetch_all(pool)
        .await
        .context("failed to get expired leases")?;

    Ok(leases)
}

/// All leases, regardless of expiry. Used by sweeper pass B, which must
/// inspect every lease's task, not just expired ones.
pub async fn get_all(pool: &PgPool) -> Result<Vec<Lease>> {
    let leases = sqlx::query_as::<_, Lease>("SELECT * FROM leases")
        .fetch_all(pool)
        .await
        .context("failed to list leases")?;

    Ok(leases)
}

/// Count leases held by an agent.
pub async fn count_for_agent(pool: &PgPool, agent_id: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leases WHERE agent_id = $1")
        .bind(agent_id)
        .fetch_one(pool)
        .await
        .context("failed to count leases for agent")?;

    Ok(row.0)
}
