//! `muster sweep` command: run the Recovery Sweeper once or in a loop.

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use muster_core::sweeper;

const JUDGE_FALLBACK_LIMIT: i64 = 50;

fn print_report(report: &sweeper::SweepReport) {
    println!(
        "Swept: {} expired lease(s), {} dangling lease(s), {} orphaned task(s), {} auto-approved",
        report.expired_leases,
        report.dangling_leases,
        report.orphaned_running_tasks,
        report.auto_approved,
    );
}

pub async fn run_once(
    pool: &PgPool,
    grace_ms: i64,
    direct_mode_auto_approve: bool,
) -> Result<()> {
    let report =
        sweeper::sweep_once(pool, grace_ms, direct_mode_auto_approve, JUDGE_FALLBACK_LIMIT, Utc::now())
            .await?;
    print_report(&report);
    Ok(())
}

pub async fn run_loop(
    pool: &PgPool,
    grace_ms: i64,
    direct_mode_auto_approve: bool,
    interval_ms: u64,
) -> Result<()> {
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));

    println!("Sweeper loop running every {interval_ms}ms. Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweeper::sweep_once(pool, grace_ms, direct_mode_auto_approve, JUDGE_FALLBACK_LIMIT, Utc::now()).await {
                    Ok(report) => {
                        if report.expired_leases + report.dangling_leases + report.orphaned_running_tasks + report.auto_approved > 0 {
                            info!(
                                expired = report.expired_leases,
                                dangling = report.dangling_leases,
                                orphaned = report.orphaned_running_tasks,
                                auto_approved = report.auto_approved,
                                "sweep pass repaired invariants"
                            );
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "sweep cycle failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nSweeper loop stopped.");
                return Ok(());
            }
        }
    }
}
