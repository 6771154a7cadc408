//! Integration tests exercising the CLI command handlers directly against
//! a real PostgreSQL instance, bypassing process spawn and clap parsing.

use chrono::Utc;

use muster_core::dispatch;
use muster_db::models::{AgentRole, TaskStatus};
use muster_db::queries::{agents, tasks};
use muster_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn agent_register_is_idempotent_and_lists() {
    let (pool, db_name) = create_test_db().await;

    let first = agents::register_agent(&pool, "w1", AgentRole::Worker).await.unwrap();
    let second = agents::register_agent(&pool, "w1", AgentRole::Worker).await.unwrap();
    assert_eq!(first.id, second.id);

    let all = agents::list_agents(&pool).await.unwrap();
    assert_eq!(all.len(), 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn task_create_list_show_round_trip() {
    let (pool, db_name) = create_test_db().await;

    let input = tasks::NewTask {
        title: "add retry jitter".into(),
        goal: "reduce thundering herd on retry".into(),
        kind: "code".into(),
        priority: 5,
        risk_level: "medium".into(),
        allowed_paths: vec!["src/retry/**".into()],
        commands: vec!["cargo test -p muster-core".into()],
        timebox_minutes: 45,
    };
    let task = muster_core::boundary::create_task(&pool, input).await.unwrap();

    let listed = tasks::list_tasks(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, task.id);

    let fetched = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "add retry jitter");
    assert_eq!(fetched.status, TaskStatus::Queued);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn task_create_rejects_empty_title() {
    let (pool, db_name) = create_test_db().await;

    let input = tasks::NewTask {
        title: "   ".into(),
        goal: "goal".into(),
        kind: "code".into(),
        priority: 0,
        risk_level: "low".into(),
        allowed_paths: vec![],
        commands: vec![],
        timebox_minutes: 30,
    };
    let result = muster_core::boundary::create_task(&pool, input).await;
    assert!(result.is_err());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn dispatch_then_judge_approve_resolves_blocked_task() {
    let (pool, db_name) = create_test_db().await;

    agents::register_agent(&pool, "judge-1", AgentRole::Judge).await.unwrap();
    let task = tasks::insert_task(
        &pool,
        &tasks::NewTask {
            title: "risky change".into(),
            goal: "touch production config".into(),
            kind: "code".into(),
            priority: 1,
            risk_level: "high".into(),
            allowed_paths: vec![],
            commands: vec![],
            timebox_minutes: 30,
        },
    )
    .await
    .unwrap();

    tasks::transition_status(&pool, task.id, TaskStatus::Queued, TaskStatus::Running)
        .await
        .unwrap();
    tasks::block_awaiting_judge(&pool, task.id, TaskStatus::Running)
        .await
        .unwrap();

    muster_core::boundary::complete_task(&pool, task.id, true).await.unwrap();

    let resolved = tasks::get_task(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(resolved.status, TaskStatus::Done);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn dispatch_once_reports_nothing_when_no_agents() {
    let (pool, db_name) = create_test_db().await;

    tasks::insert_task(
        &pool,
        &tasks::NewTask {
            title: "orphan task".into(),
            goal: "wait for a worker".into(),
            kind: "code".into(),
            priority: 0,
            risk_level: "low".into(),
            allowed_paths: vec![],
            commands: vec![],
            timebox_minutes: 30,
        },
    )
    .await
    .unwrap();

    let outcome = dispatch::dispatch_once(&pool, 60, 50, Utc::now()).await.unwrap();
    assert!(outcome.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
