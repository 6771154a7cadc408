mod agent_cmd;
mod config;
mod dispatch_cmd;
mod judge_cmd;
mod run_cmd;
mod status_cmd;
mod sweep_cmd;
mod task_cmd;

use clap::{Parser, Subcommand};

use muster_db::pool;

#[derive(Parser)]
#[command(name = "muster", about = "Agent-fleet task scheduling and lease subsystem")]
struct Cli {
    /// Database URL (overrides MUSTER_DATABASE_URL env var and config file)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a muster config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/muster")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the muster database (requires config file or env vars)
    DbInit,
    /// Agent roster management
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Run the Dispatcher
    Dispatch {
        /// Run a single dispatch cycle and exit
        #[arg(long, conflicts_with = "loop_mode")]
        once: bool,
        /// Run the dispatcher repeatedly until Ctrl+C
        #[arg(long = "loop")]
        loop_mode: bool,
        /// Lease duration in minutes for tasks claimed this run
        #[arg(long)]
        lease_duration_minutes: Option<i64>,
        /// Interval between dispatch cycles in loop mode, in milliseconds
        #[arg(long, default_value_t = 2_000)]
        interval_ms: u64,
    },
    /// Run the Recovery Sweeper
    Sweep {
        /// Run a single sweep pass and exit
        #[arg(long, conflicts_with = "loop_mode")]
        once: bool,
        /// Run the sweeper repeatedly until Ctrl+C
        #[arg(long = "loop")]
        loop_mode: bool,
        /// Interval between sweep cycles in loop mode, in milliseconds
        #[arg(long, default_value_t = 10_000)]
        interval_ms: u64,
    },
    /// Run lifecycle reporting (worker-facing)
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Judge decisions on tasks blocked `awaiting_judge`
    Judge {
        #[command(subcommand)]
        command: JudgeCommands,
    },
    /// Show fleet-wide task and agent progress summary
    Status,
}

#[derive(Subcommand)]
enum AgentCommands {
    /// Register a new agent, or re-register an existing one
    Register {
        /// Agent id
        id: String,
        /// Agent role: planner, worker, judge, tester
        #[arg(long)]
        role: String,
    },
    /// Record a liveness heartbeat for an agent
    Heartbeat {
        /// Agent id
        id: String,
    },
    /// List all registered agents
    List,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a new task
    Create {
        /// Short task title
        #[arg(long)]
        title: String,
        /// Description of what success looks like
        #[arg(long)]
        goal: String,
        /// Opaque task kind
        #[arg(long, default_value = "code")]
        kind: String,
        /// Scheduling priority, higher first
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Risk level label
        #[arg(long, default_value = "low")]
        risk_level: String,
        /// Allowed glob path pattern (repeatable)
        #[arg(long = "allowed-path")]
        allowed_path: Vec<String>,
        /// Verification command, in order (repeatable)
        #[arg(long = "command")]
        command: Vec<String>,
        /// Timebox in minutes
        #[arg(long, default_value_t = 60)]
        timebox_minutes: i32,
        /// Task id this task depends on (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },
    /// List all tasks
    List,
    /// Show full details for one task
    Show {
        /// Task id
        id: String,
    },
}

#[derive(Subcommand)]
enum RunCommands {
    /// Report the terminal outcome of a run
    Complete {
        /// Run id
        run_id: String,
        /// Outcome: success, failed, cancelled
        #[arg(long)]
        outcome: String,
        /// Human-readable failure message
        #[arg(long)]
        error_message: Option<String>,
        /// Structured error metadata as a JSON object
        #[arg(long)]
        error_meta: Option<String>,
    },
    /// Record an artifact produced by a run
    Artifact {
        /// Run id
        run_id: String,
        /// Artifact type: pr, commit, ci_result, branch, base_repo_diff
        #[arg(long = "type")]
        artifact_type: String,
        /// Artifact reference (e.g. branch name, commit sha)
        #[arg(long = "ref")]
        ref_: Option<String>,
        /// Artifact URL
        #[arg(long)]
        url: Option<String>,
        /// Artifact metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
}

#[derive(Subcommand)]
enum JudgeCommands {
    /// Approve a task blocked `awaiting_judge`
    Approve {
        /// Task id
        task_id: String,
    },
    /// Reject a task blocked `awaiting_judge`
    Reject {
        /// Task id
        task_id: String,
    },
}

/// Execute the `muster init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        scheduler: config::SchedulerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `muster db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `muster db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = config::resolve(cli_db_url);
    let db_config = muster_db::config::DbConfig::new(resolved.database_url.clone());

    println!("Initializing muster database...");

    pool::ensure_database_exists(&db_config).await?;
    let db_pool = pool::create_pool(&db_config).await?;

    let migrations_path = pool::default_migrations_path();
    pool::run_migrations(&db_pool, migrations_path).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("muster db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Init { db_url, force } = &cli.command {
        cmd_init(db_url, *force)?;
        return Ok(());
    }
    if matches!(cli.command, Commands::DbInit) {
        cmd_db_init(cli.database_url.as_deref()).await?;
        return Ok(());
    }

    let resolved = config::resolve(cli.database_url.as_deref());
    let db_config = muster_db::config::DbConfig::new(resolved.database_url.clone());
    let db_pool = pool::create_pool(&db_config).await?;

    let result = run_command(cli.command, &db_pool, &resolved).await;

    db_pool.close().await;
    result
}

async fn run_command(
    command: Commands,
    db_pool: &sqlx::PgPool,
    resolved: &muster_core::config::Config,
) -> anyhow::Result<()> {
    match command {
        Commands::Init { .. } | Commands::DbInit => unreachable!("handled before pool creation"),
        Commands::Agent { command } => agent_cmd::run_agent_command(command, db_pool).await,
        Commands::Task { command } => task_cmd::run_task_command(command, db_pool).await,
        Commands::Dispatch {
            once: _,
            loop_mode,
            lease_duration_minutes,
            interval_ms,
        } => {
            let lease_minutes =
                lease_duration_minutes.unwrap_or(resolved.default_lease_duration_minutes);
            if loop_mode {
                dispatch_cmd::run_loop(db_pool, lease_minutes, interval_ms).await
            } else {
                dispatch_cmd::run_once(db_pool, lease_minutes).await.map(|_| ())
            }
        }
        Commands::Sweep {
            once: _,
            loop_mode,
            interval_ms,
        } => {
            if loop_mode {
                sweep_cmd::run_loop(
                    db_pool,
                    resolved.sweeper_grace_ms,
                    resolved.direct_mode_auto_approve,
                    interval_ms,
                )
                .await
            } else {
                sweep_cmd::run_once(db_pool, resolved.sweeper_grace_ms, resolved.direct_mode_auto_approve).await
            }
        }
        Commands::Run { command } => {
            run_cmd::run_run_command(command, db_pool, resolved.global_retry_budget).await
        }
        Commands::Judge { command } => match command {
            JudgeCommands::Approve { task_id } => judge_cmd::run_approve(db_pool, &task_id).await,
            JudgeCommands::Reject { task_id } => judge_cmd::run_reject(db_pool, &task_id).await,
        },
        Commands::Status => status_cmd::run_status(db_pool).await,
    }
}
