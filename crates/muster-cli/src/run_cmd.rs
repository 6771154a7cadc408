//! `muster run` commands: worker-facing completion and artifact reporting.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use muster_core::boundary::{self, RunOutcome};
use muster_db::models::ArtifactType;

use crate::RunCommands;

pub async fn run_run_command(
    command: RunCommands,
    pool: &PgPool,
    global_retry_budget: i32,
) -> Result<()> {
    match command {
        RunCommands::Complete {
            run_id,
            outcome,
            error_message,
            error_meta,
        } => cmd_complete(pool, &run_id, &outcome, error_message, error_meta, global_retry_budget).await,
        RunCommands::Artifact {
            run_id,
            artifact_type,
            ref_,
            url,
            metadata,
        } => cmd_artifact(pool, &run_id, &artifact_type, ref_, url, metadata).await,
    }
}

async fn cmd_complete(
    pool: &PgPool,
    run_id_str: &str,
    outcome_str: &str,
    error_message: Option<String>,
    error_meta: Option<String>,
    global_retry_budget: i32,
) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str).with_context(|| format!("invalid run id: {run_id_str}"))?;

    let outcome = match outcome_str {
        "success" => RunOutcome::Success,
        "failed" => RunOutcome::Failed,
        "cancelled" => RunOutcome::Cancelled,
        other => bail!("invalid run outcome {other:?}: expected success|failed|cancelled"),
    };

    let meta = error_meta
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("error-meta must be valid JSON")?;

    boundary::complete_run(
        pool,
        run_id,
        outcome,
        error_message.as_deref(),
        meta.as_ref(),
        global_retry_budget,
    )
    .await?;

    println!("Run {run_id} completed as {outcome_str}");
    Ok(())
}

async fn cmd_artifact(
    pool: &PgPool,
    run_id_str: &str,
    artifact_type_str: &str,
    ref_: Option<String>,
    url: Option<String>,
    metadata: Option<String>,
) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str).with_context(|| format!("invalid run id: {run_id_str}"))?;
    let artifact_type: ArtifactType = artifact_type_str
        .parse()
        .with_context(|| format!("invalid artifact type: {artifact_type_str}"))?;

    let meta = metadata
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("metadata must be valid JSON")?;

    let artifact = boundary::record_artifact(
        pool,
        run_id,
        artifact_type,
        ref_.as_deref(),
        url.as_deref(),
        meta.as_ref(),
    )
    .await?;

    println!("Recorded artifact {} ({artifact_type_str})", artifact.id);
    Ok(())
}
