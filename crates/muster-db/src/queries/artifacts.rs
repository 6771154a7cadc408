//! Database query functions for the `artifacts` table.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Artifact, ArtifactType};

/// Record an artifact produced by a run.
pub async fn insert_artifact(
    pool: &PgPool,
    run_id: Uuid,
    artifact_type: ArtifactType,
    ref_: Option<&str>,
    url: Option<&str>,
    metadata: Option<&Value>,
) -> Result<Artifact> {
    let artifact = sqlx::query_as::<_, Artifact>(
        "INSERT INTO artifacts (run_id, type, ref, url, metadata) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(run_id)
    .bind(artifact_type)
    .bind(ref_)
    .bind(url)
    .bind(metadata)
    .fetch_one(pool)
    .await
    .context("failed to insert artifact")?;

    Ok(artifact)
}

/// List artifacts recorded against a run, oldest first.
pub async fn list_artifacts_for_run(pool: &PgPool, run_id: Uuid) -> Result<Vec<Artifact>> {
    let artifacts = sqlx::query_as::<_, Artifact>(
        "SELECT * FROM artifacts WHERE run_id = $1 ORDER BY created_at ASC",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .context("failed to list artifacts for run")?;

    Ok(artifacts)
}

/// Fetch a single artifact by id.
pub async fn get_artifact(pool: &PgPool, id: Uuid) -> Result<Option<Artifact>> {
    let artifact = sqlx::query_as::<_, Artifact>("SELECT * FROM artifacts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch artifact")?;

    Ok(artifact)
}
