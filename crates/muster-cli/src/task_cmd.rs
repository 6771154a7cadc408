//! `muster task` commands: create, list, show.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use muster_db::queries::tasks::{self, NewTask};

use crate::TaskCommands;

pub async fn run_task_command(command: TaskCommands, pool: &PgPool) -> Result<()> {
    match command {
        TaskCommands::Create {
            title,
            goal,
            kind,
            priority,
            risk_level,
            allowed_path,
            command,
            timebox_minutes,
            depends_on,
        } => {
            cmd_create(
                pool,
                NewTask {
                    title,
                    goal,
                    kind,
                    priority,
                    risk_level,
                    allowed_paths: allowed_path,
                    commands: command,
                    timebox_minutes,
                },
                &depends_on,
            )
            .await
        }
        TaskCommands::List => cmd_list(pool).await,
        TaskCommands::Show { id } => cmd_show(pool, &id).await,
    }
}

async fn cmd_create(pool: &PgPool, input: NewTask, depends_on: &[String]) -> Result<()> {
    let dependency_ids = depends_on
        .iter()
        .map(|s| Uuid::parse_str(s).with_context(|| format!("invalid dependency task id: {s}")))
        .collect::<Result<Vec<_>>>()?;

    let task = muster_core::boundary::create_task(pool, input).await?;

    for dep_id in dependency_ids {
        tasks::insert_task_dependency(pool, task.id, dep_id).await?;
    }

    println!("Created task {} ({})", task.id, task.title);
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let all_tasks = tasks::list_tasks(pool).await?;

    if all_tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<28} {:<10} {:>8} {:>6}",
        "ID", "TITLE", "STATUS", "PRIORITY", "RETRY"
    );
    println!("{}", "-".repeat(96));
    for task in &all_tasks {
        let title_display = if task.title.chars().count() > 26 {
            format!("{}...", task.title.chars().take(23).collect::<String>())
        } else {
            task.title.clone()
        };
        println!(
            "{:<38} {:<28} {:<10} {:>8} {:>6}",
            task.id, title_display, task.status, task.priority, task.retry_count
        );
    }

    Ok(())
}

async fn cmd_show(pool: &PgPool, id_str: &str) -> Result<()> {
    let id = Uuid::parse_str(id_str).with_context(|| format!("invalid task id: {id_str}"))?;
    let task = tasks::get_task(pool, id)
        .await?
        .with_context(|| format!("task {id} not found"))?;

    println!("Task: {} ({})", task.title, task.id);
    println!("  goal:             {}", task.goal);
    println!("  kind:             {}", task.kind);
    println!("  status:           {}", task.status);
    if let Some(reason) = &task.block_reason {
        println!("  block_reason:     {reason}");
    }
    println!("  priority:         {}", task.priority);
    println!("  risk_level:       {}", task.risk_level);
    println!("  allowed_paths:    {}", task.allowed_paths.join(", "));
    println!("  commands:         {}", task.commands.join("; "));
    println!("  timebox_minutes:  {}", task.timebox_minutes);
    println!("  retry_count:      {}", task.retry_count);
    println!(
        "  updated_at:       {}",
        task.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  created_at:       {}",
        task.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let dependencies = tasks::get_task_dependencies(pool, task.id).await?;
    if !dependencies.is_empty() {
        println!("  dependencies:");
        for dep in &dependencies {
            println!("    - {dep}");
        }
    }

    let runs = muster_db::queries::runs::list_runs_for_task(pool, task.id).await?;
    if !runs.is_empty() {
        println!("  runs:");
        for run in &runs {
            println!("    - {} [{}] agent={}", run.id, run.status, run.agent_id);
        }
    }

    Ok(())
}
