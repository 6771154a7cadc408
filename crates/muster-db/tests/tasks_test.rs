//! Integration tests for task queries.

use muster_db::models::TaskStatus;
use muster_db::queries::tasks::{self, NewTask};
use muster_test_utils::{create_test_db, drop_test_db};
use uuid::Uuid;

fn sample_task() -> NewTask {
    NewTask {
        title: "fix the thing".into(),
        goal: "make the tests pass".into(),
        kind: "code".into(),
        priority: 0,
        risk_level: "low".into(),
        allowed_paths: vec!["src/".into()],
        commands: vec!["cargo test".into()],
        timebox_minutes: 30,
    }
}

#[tokio::test]
async fn insert_and_get_task() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.retry_count, 0);
    assert!(task.block_reason.is_none());

    let fetched = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, task.id);
    assert_eq!(fetched.title, "fix the thing");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_task_returns_none_for_missing_id() {
    let (pool, db_name) = create_test_db().await;

    let result = tasks::get_task(&pool, Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn task_dependencies_gate_readiness() {
    let (pool, db_name) = create_test_db().await;

    let a = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    let b = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    tasks::insert_task_dependency(&pool, b.id, a.id).await.unwrap();

    // b depends on a, which is still queued: b is not ready.
    let ready = tasks::get_ready_tasks(&pool, 10).await.unwrap();
    let ready_ids: Vec<Uuid> = ready.iter().map(|t| t.id).collect();
    assert!(ready_ids.contains(&a.id));
    assert!(!ready_ids.contains(&b.id));

    // Once a is done, b becomes ready.
    tasks::transition_status(&pool, a.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();
    tasks::complete(&pool, a.id, TaskStatus::Running).await.unwrap();

    let ready = tasks::get_ready_tasks(&pool, 10).await.unwrap();
    let ready_ids: Vec<Uuid> = ready.iter().map(|t| t.id).collect();
    assert!(ready_ids.contains(&b.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn task_dependency_insert_is_idempotent() {
    let (pool, db_name) = create_test_db().await;

    let a = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    let b = tasks::insert_task(&pool, &sample_task()).await.unwrap();

    tasks::insert_task_dependency(&pool, b.id, a.id).await.unwrap();
    tasks::insert_task_dependency(&pool, b.id, a.id).await.unwrap();

    let deps = tasks::get_task_dependencies(&pool, b.id).await.unwrap();
    assert_eq!(deps, vec![a.id]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_ready_tasks_orders_by_priority_then_age() {
    let (pool, db_name) = create_test_db().await;

    let mut low = sample_task();
    low.priority = 0;
    let mut high = sample_task();
    high.priority = 10;

    let low_task = tasks::insert_task(&pool, &low).await.unwrap();
    let high_task = tasks::insert_task(&pool, &high).await.unwrap();

    let ready = tasks::get_ready_tasks(&pool, 10).await.unwrap();
    let first_higher_priority = ready
        .iter()
        .position(|t| t.id == high_task.id)
        .unwrap()
        < ready.iter().position(|t| t.id == low_task.id).unwrap();
    assert!(first_higher_priority);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn transition_status_is_conditional_on_from_state() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();

    // Wrong "from" does nothing.
    let rows = tasks::transition_status(&pool, task.id, TaskStatus::Running, TaskStatus::Done)
        .await
        .unwrap();
    assert_eq!(rows, 0);
    let unchanged = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TaskStatus::Queued);

    // Correct "from" succeeds.
    let rows = tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    let running = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(running.status, TaskStatus::Running);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn requeue_with_retry_increments_count_and_clears_block_reason() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();

    tasks::requeue_with_retry(&pool, task.id, TaskStatus::Running)
        .await
        .unwrap();

    let requeued = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(requeued.status, TaskStatus::Queued);
    assert_eq!(requeued.retry_count, 1);
    assert!(requeued.block_reason.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn requeue_without_retry_does_not_touch_retry_count() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();

    tasks::requeue_without_retry(&pool, task.id, TaskStatus::Running)
        .await
        .unwrap();

    let requeued = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(requeued.status, TaskStatus::Queued);
    assert_eq!(requeued.retry_count, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn block_awaiting_judge_sets_reason() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();
    tasks::block_awaiting_judge(&pool, task.id, TaskStatus::Running)
        .await
        .unwrap();

    let blocked = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(blocked.status, TaskStatus::Blocked);
    assert_eq!(blocked.block_reason.as_deref(), Some("awaiting_judge"));

    let awaiting = tasks::list_awaiting_judge(&pool, 10).await.unwrap();
    assert_eq!(awaiting.len(), 1);
    assert_eq!(awaiting[0].id, task.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_stale_running_finds_tasks_older_than_cutoff() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();

    let future_cutoff = chrono::Utc::now() + chrono::Duration::minutes(1);
    let stale = tasks::list_stale_running(&pool, future_cutoff).await.unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, task.id);

    let past_cutoff = chrono::Utc::now() - chrono::Duration::minutes(1);
    let not_stale = tasks::list_stale_running(&pool, past_cutoff).await.unwrap();
    assert!(not_stale.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn fail_transitions_to_terminal_state() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();
    tasks::fail(&pool, task.id, TaskStatus::Running).await.unwrap();

    let failed = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);

    pool.close().await;
    drop_test_db(&db_name).await;
}
