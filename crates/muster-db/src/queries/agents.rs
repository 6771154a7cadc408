//! Database query functions for the `agents` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Agent, AgentRole, AgentStatus};

/// Register a new agent, or return the existing row if `id` is already
/// registered (idempotent, since a worker process may restart and
/// re-register with the same id).
pub async fn register_agent(pool: &PgPool, id: &str, role: AgentRole) -> Result<Agent> {
    let agent = sqlx::query_as::<_, Agent>(
        "INSERT INTO agents (id, role) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET id = agents.id \
         RETURNING *",
    )
    .bind(id)
    .bind(role)
    .fetch_one(pool)
    .await
    .context("failed to register agent")?;

    Ok(agent)
}

/// Fetch a single agent by id.
pub async fn get_agent(pool: &PgPool, id: &str) -> Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch agent")?;

    Ok(agent)
}

/// List all agents, ordered by id.
pub async fn list_agents(pool: &PgPool) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>("SELECT * FROM agents ORDER BY id")
        .fetch_all(pool)
        .await
        .context("failed to list agents")?;

    Ok(agents)
}

/// List all idle agents (candidates for dispatch).
pub async fn list_idle_agents(pool: &PgPool) -> Result<Vec<Agent>> {
    let agents =
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE status = 'idle' ORDER BY id")
            .fetch_all(pool)
            .await
            .context("failed to list idle agents")?;

    Ok(agents)
}

/// Record a liveness tick: set `last_heartbeat = now()`.
pub async fn record_heartbeat(pool: &PgPool, id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE agents SET last_heartbeat = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to record heartbeat")?;

    Ok(result.rows_affected())
}

/// Mark an agent busy and assign it a task.
pub async fn mark_busy(pool: &PgPool, id: &str, task_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE agents SET status = 'busy', current_task_id = $1, last_heartbeat = now() \
         WHERE id = $2",
    )
    .bind(task_id)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to mark agent busy")?;

    Ok(result.rows_affected())
}

/// Mark an agent idle and clear its current task. This is the only path
/// that should set `status = idle`; callers must first verify the agent
/// holds no lease and owns no running run (see `lease::reconcile_agent`).
pub async fn mark_idle(pool: &PgPool, id: &str) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE agents SET status = 'idle', current_task_id = NULL, last_heartbeat = now() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to mark agent idle")?;

    Ok(result.rows_affected())
}

/// Mark an agent offline (used when its heartbeat has gone stale for
/// longer than an operator-defined window; the core itself never calls
/// this automatically -- staleness is a signal an operator acts on, not
/// a direct cause of any state transition).
pub async fn mark_offline(pool: &PgPool, id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE agents SET status = 'offline' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to mark agent offline")?;

    Ok(result.rows_affected())
}

/// Count agents whose `status = 'busy'` but who hold no active lease and
/// own no running run -- a violation of invariant 4, exposed for property
/// tests.
pub async fn count_busy_agents_without_work(pool: &PgPool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM agents a \
         WHERE a.status = 'busy' \
           AND NOT EXISTS (SELECT 1 FROM leases l WHERE l.agent_id = a.id) \
           AND NOT EXISTS ( \
               SELECT 1 FROM runs r WHERE r.agent_id = a.id AND r.status = 'running' \
           )",
    )
    .fetch_one(pool)
    .await
    .context("failed to count busy agents without work")?;

    Ok(row.0)
}
