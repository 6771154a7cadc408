//! `muster judge` commands: resolve a task blocked `awaiting_judge`.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use muster_core::boundary;

pub async fn run_approve(pool: &PgPool, task_id_str: &str) -> Result<()> {
    let task_id = Uuid::parse_str(task_id_str).with_context(|| format!("invalid task id: {task_id_str}"))?;
    boundary::complete_task(pool, task_id, true).await?;
    println!("Task {task_id} approved.");
    Ok(())
}

pub async fn run_reject(pool: &PgPool, task_id_str: &str) -> Result<()> {
    let task_id = Uuid::parse_str(task_id_str).with_context(|| format!("invalid task id: {task_id_str}"))?;
    boundary::complete_task(pool, task_id, false).await?;
    println!("Task {task_id} rejected.");
    Ok(())
}
