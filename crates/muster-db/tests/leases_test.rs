//! Integration tests for lease queries.

use chrono::{Duration, Utc};
use muster_db::queries::tasks::{self, NewTask};
use muster_db::queries::{agents, leases};
use muster_db::models::AgentRole;
use muster_test_utils::{create_test_db, drop_test_db};
use uuid::Uuid;

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
async fn acquire_succeeds_on_unclaimed_task() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();

    let expires_at = Utc::now() + Duration::minutes(60);
    let lease = leases::acquire(&pool, task.id, "worker-1", expires_at)
        .await
        .unwrap()
        .expect("lease should be acquired");

    assert_eq!(lease.task_id, task.id);
    assert_eq!(lease.agent_id, "worker-1");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn acquire_returns_none_when_already_held() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    agents::register_agent(&pool, "worker-2", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();

    let expires_at = Utc::now() + Duration::minutes(60);
    leases::acquire(&pool, task.id, "worker-1", expires_at)
        .await
        .unwrap()
        .expect("first acquire should win");

    let second = leases::acquire(&pool, task.id, "worker-2", expires_at)
        .await
        .unwrap();
    assert!(second.is_none(), "second acquire should see already_held");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_acquire_has_exactly_one_winner() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    agents::register_agent(&pool, "worker-2", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    let expires_at = Utc::now() + Duration::minutes(60);

    let pool1 = pool.clone();
    let task_id = task.id;
    let handle1 =
        tokio::spawn(async move { leases::acquire(&pool1, task_id, "worker-1", expires_at).await });
    let pool2 = pool.clone();
    let handle2 =
        tokio::spawn(async move { leases::acquire(&pool2, task_id, "worker-2", expires_at).await });

    let result1 = handle1.await.unwrap().unwrap();
    let result2 = handle2.await.unwrap().unwrap();

    let winners = [result1.is_some(), result2.is_some()]
        .iter()
        .filter(|x| **x)
        .count();
    assert_eq!(
        winners, 1,
        "exactly one concurrent acquire should win, but {winners} did"
    );

    let held = leases::get_for_task(&pool, task.id).await.unwrap();
    assert!(held.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn extend_updates_expiry_unconditionally() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    let initial_expiry = Utc::now() + Duration::minutes(10);
    leases::acquire(&pool, task.id, "worker-1", initial_expiry)
        .await
        .unwrap();

    let later_expiry = Utc::now() + Duration::minutes(70);
    let rows = leases::extend(&pool, task.id, later_expiry).await.unwrap();
    assert_eq!(rows, 1);

    let lease = leases::get_for_task(&pool, task.id).await.unwrap().unwrap();
    assert!((lease.expires_at - later_expiry).num_seconds().abs() < 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_for_task_frees_the_slot_for_reacquisition() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    agents::register_agent(&pool, "worker-2", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();
    let expires_at = Utc::now() + Duration::minutes(60);

    leases::acquire(&pool, task.id, "worker-1", expires_at)
        .await
        .unwrap();
    let deleted = leases::delete_for_task(&pool, task.id).await.unwrap();
    assert_eq!(deleted, 1);

    let reacquired = leases::acquire(&pool, task.id, "worker-2", expires_at)
        .await
        .unwrap();
    assert!(reacquired.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_expired_finds_leases_past_their_deadline() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "worker-1", AgentRole::Worker)
        .await
        .unwrap();
    let task = tasks::insert_task(&pool, &sample_task()).await.unwrap();

    // Backdate the expiry by inserting with an already-past timestamp.
    let past = Utc::now() - Duration::minutes(5);
    leases::acquire(&pool, task.id, "worker-1", past).await.unwrap();

    let expired = leases::get_expired(&pool, Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].task_id, task.id);

    let active = leases::get_active(&pool, Utc::now()).await.unwrap();
    assert!(active.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_for_task_returns_none_when_unleased() {
    let (pool, db_name) = create_test_db().await;

    let result = leases::get_for_task(&pool, Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
