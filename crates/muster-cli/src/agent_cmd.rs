//! `muster agent` commands: register, heartbeat, list.

use anyhow::{Context, Result};
use sqlx::PgPool;

use muster_core::heartbeat;
use muster_db::models::AgentRole;
use muster_db::queries::agents;

use crate::AgentCommands;

pub async fn run_agent_command(command: AgentCommands, pool: &PgPool) -> Result<()> {
    match command {
        AgentCommands::Register { id, role } => cmd_register(pool, &id, &role).await,
        AgentCommands::Heartbeat { id } => cmd_heartbeat(pool, &id).await,
        AgentCommands::List => cmd_list(pool).await,
    }
}

async fn cmd_register(pool: &PgPool, id: &str, role: &str) -> Result<()> {
    let role: AgentRole = role
        .parse()
        .with_context(|| format!("invalid agent role: {role}"))?;
    let agent = agents::register_agent(pool, id, role).await?;
    println!("Registered agent {} ({})", agent.id, agent.role);
    Ok(())
}

async fn cmd_heartbeat(pool: &PgPool, id: &str) -> Result<()> {
    heartbeat::record_heartbeat(pool, id).await?;
    println!("Heartbeat recorded for {id}");
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let agents = agents::list_agents(pool).await?;

    if agents.is_empty() {
        println!("No agents registered.");
        return Ok(());
    }

    println!("{:<24} {:<10} {:<10} {:<38}", "ID", "ROLE", "STATUS", "CURRENT TASK");
    println!("{}", "-".repeat(84));
    for agent in &agents {
        let current_task = agent
            .current_task_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<10} {:<10} {:<38}",
            agent.id, agent.role, agent.status, current_task
        );
    }

    Ok(())
}
