//! Integration tests for artifact queries.

use muster_db::models::{AgentRole, ArtifactType};
use muster_db::queries::tasks::{self, NewTask};
use muster_db::queries::{agents, artifacts, runs};
use muster_test_utils::{create_test_db, drop_test_db};
use serde_json::json;

fn sample_task() -> NewTask {
    NewTask {
        title: "fix the thing".into(),
        goal: "make the tests pass".into(),
        kind: "code".into(),
        priority: 0,
        risk_level: "low".into(),
        allowed_paths: vec![],
        commands: vec![],
        timebox_minutes: 30,
    }
}

#[tokio::test]
async fn insert_and_list_artifacts_for_run() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    let run = runs::insert_run(&pool, task.id, "worker-1").await.unwrap();

    artifacts::insert_artifact(
        &pool,
        run.id,
        ArtifactType::Branch,
        Some("feature/fix"),
        None,
        None,
    )
    .await
    .unwrap();

    let meta = json!({"provider": "github"});
    let pr = artifacts::insert_artifact(
        &pool,
        run.id,
        ArtifactType::Pr,
        Some("refs/pull/1"),
        Some("https://example.invalid/pr/1"),
        Some(&meta),
    )
    .await
    .unwrap();

    let listed = artifacts::list_artifacts_for_run(&pool, run.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].id, pr.id);
    assert_eq!(listed[1].url.as_deref(), Some("https://example.invalid/pr/1"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_artifact_returns_none_for_missing_id() {
    let (pool, db_name) = create_test_db().await;

    let result = artifacts::get_artifact(&pool, uuid::Uuid::new_v4())
        .await
        .unwrap();
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
