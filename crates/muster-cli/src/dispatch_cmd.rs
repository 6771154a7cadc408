//! `muster dispatch` command: run the Dispatcher once or in a loop.

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use muster_core::dispatch;

const MAX_CANDIDATES: i64 = 50;

/// Run a single dispatch cycle. Returns whether a task was claimed.
pub async fn run_once(pool: &PgPool, lease_duration_minutes: i64) -> Result<bool> {
    let outcome = dispatch::dispatch_once(pool, lease_duration_minutes, MAX_CANDIDATES, Utc::now())
        .await?;

    match outcome {
        Some(o) => {
            println!(
                "Dispatched task {} to run {} (lease {})",
                o.task_id, o.run_id, o.lease_id
            );
            Ok(true)
        }
        None => {
            println!("Nothing to dispatch (no idle agent or no ready task).");
            Ok(false)
        }
    }
}

/// Run the dispatcher on a fixed interval until Ctrl+C.
pub async fn run_loop(pool: &PgPool, lease_duration_minutes: i64, interval_ms: u64) -> Result<()> {
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));

    println!("Dispatcher loop running every {interval_ms}ms. Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match dispatch::dispatch_once(pool, lease_duration_minutes, MAX_CANDIDATES, Utc::now()).await {
                    Ok(Some(o)) => info!(task_id = %o.task_id, run_id = %o.run_id, "dispatched"),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "dispatch cycle failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDispatcher loop stopped.");
                return Ok(());
            }
        }
    }
}
