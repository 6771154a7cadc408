//! `muster status` command: fleet-wide task and agent progress summary.

use anyhow::Result;
use sqlx::PgPool;

use muster_db::models::{AgentStatus, TaskStatus};
use muster_db::queries::{agents, tasks};

pub async fn run_status(pool: &PgPool) -> Result<()> {
    let all_tasks = tasks::list_tasks(pool).await?;
    let all_agents = agents::list_agents(pool).await?;

    let task_count = |status: TaskStatus| all_tasks.iter().filter(|t| t.status == status).count();

    println!("Tasks: {} total", all_tasks.len());
    println!(
        "  queued={} running={} blocked={} done={} failed={} cancelled={}",
        task_count(TaskStatus::Queued),
        task_count(TaskStatus::Running),
        task_count(TaskStatus::Blocked),
        task_count(TaskStatus::Done),
        task_count(TaskStatus::Failed),
        task_count(TaskStatus::Cancelled),
    );
    println!();

    let agent_count = |status: AgentStatus| all_agents.iter().filter(|a| a.status == status).count();

    println!("Agents: {} registered", all_agents.len());
    println!(
        "  idle={} busy={} offline={}",
        agent_count(AgentStatus::Idle),
        agent_count(AgentStatus::Busy),
        agent_count(AgentStatus::Offline),
    );

    Ok(())
}
