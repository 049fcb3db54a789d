use chrono::{Days, Utc};
use qscope::db;
use qscope::error::{ErrorKind, InspectorError};
use qscope::inspector::{Config, Inspector, SqliteInspector, init_pool};
use qscope::models::TaskState;
use sqlx::SqlitePool;

fn test_config(tmp: &tempfile::TempDir) -> Config {
    Config { db_path: tmp.path().join("test.db"), force_recreate: true }
}

async fn setup(tmp: &tempfile::TempDir) -> anyhow::Result<(SqlitePool, SqliteInspector)> {
    let pool = init_pool(&test_config(tmp)).await?;
    Ok((pool.clone(), SqliteInspector::new(pool)))
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[tokio::test]
async fn queues_are_listed_by_name() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;

    assert!(inspector.queues().await?.is_empty());
    for name in ["image-resize", "email", "critical"] {
        db::create_queue(&pool, name, now_ms()).await?;
    }
    assert_eq!(inspector.queues().await?, ["critical", "email", "image-resize"]);
    Ok(())
}

#[tokio::test]
async fn queue_info_aggregates_tasks_and_stats() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;
    db::create_queue(&pool, "email", now_ms()).await?;

    let now = now_ms();
    db::insert_task(&pool, "email", TaskState::Pending, "{}", now - 5_000).await?;
    db::insert_task(&pool, "email", TaskState::Pending, "{}", now).await?;
    db::insert_task(&pool, "email", TaskState::Active, "{}", now).await?;
    db::insert_task(&pool, "email", TaskState::Retry, "{}", now).await?;
    db::insert_task(&pool, "email", TaskState::Completed, "{}", now).await?;

    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap();
    db::record_daily_stats(&pool, "email", today, 8, 2).await?;
    db::record_daily_stats(&pool, "email", today, 2, 1).await?;
    db::record_daily_stats(&pool, "email", yesterday, 30, 5).await?;

    let info = inspector.queue_info("email").await?;
    assert_eq!(info.queue, "email");
    assert_eq!(info.pending, 2);
    assert_eq!(info.active, 1);
    assert_eq!(info.retry, 1);
    assert_eq!(info.completed, 1);
    assert_eq!(info.size, 4);
    assert!(info.latency.as_millis() >= 5_000);
    assert_eq!((info.processed, info.failed), (10, 3));
    assert_eq!((info.processed_total, info.failed_total), (40, 8));
    assert!(!info.paused);
    Ok(())
}

#[tokio::test]
async fn queue_info_unknown_queue_is_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (_pool, inspector) = setup(&dir).await?;

    let err = inspector.queue_info("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn history_is_bounded_by_window_and_unpadded() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;
    db::create_queue(&pool, "email", now_ms()).await?;

    let today = Utc::now().date_naive();
    for back in [0u64, 3, 20] {
        let day = today.checked_sub_days(Days::new(back)).unwrap();
        db::record_daily_stats(&pool, "email", day, 10, 1).await?;
    }

    let last_ten = inspector.history("email", 10).await?;
    assert_eq!(last_ten.len(), 2);
    assert!(last_ten[0].date < last_ten[1].date);
    assert_eq!(last_ten[1].date, today);

    assert_eq!(inspector.history("email", 90).await?.len(), 3);
    assert_eq!(inspector.history("email", 1).await?.len(), 1);
    assert!(inspector.history("email", 0).await?.is_empty());

    let err = inspector.history("missing", 10).await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn delete_distinguishes_missing_and_non_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;

    let err = inspector.delete_queue("missing", false).await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueNotFound(_)));

    db::create_queue(&pool, "busy", now_ms()).await?;
    db::insert_task(&pool, "busy", TaskState::Scheduled, "{}", now_ms()).await?;
    let err = inspector.delete_queue("busy", false).await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueNotEmpty(_)));
    assert_eq!(inspector.queues().await?, ["busy"]);

    // Completed tasks do not block deletion.
    db::create_queue(&pool, "done", now_ms()).await?;
    db::insert_task(&pool, "done", TaskState::Completed, "{}", now_ms()).await?;
    db::record_daily_stats(&pool, "done", Utc::now().date_naive(), 1, 0).await?;
    inspector.delete_queue("done", false).await?;
    assert_eq!(inspector.queues().await?, ["busy"]);
    Ok(())
}

#[tokio::test]
async fn force_delete_is_blocked_only_by_active_tasks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;
    db::create_queue(&pool, "q", now_ms()).await?;
    db::insert_task(&pool, "q", TaskState::Pending, "{}", now_ms()).await?;
    let active = db::insert_task(&pool, "q", TaskState::Active, "{}", now_ms()).await?;

    let err = inspector.delete_queue("q", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    sqlx::query("UPDATE task SET state = 'completed' WHERE id = ?")
        .bind(active)
        .execute(&pool)
        .await?;
    inspector.delete_queue("q", true).await?;
    assert!(inspector.queues().await?.is_empty());

    let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task WHERE queue = 'q'")
        .fetch_one(&pool)
        .await?;
    assert_eq!(leftover, 0);
    Ok(())
}

#[tokio::test]
async fn pause_then_resume_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;
    db::create_queue(&pool, "email", now_ms()).await?;

    inspector.pause_queue("email").await?;
    assert!(inspector.queue_info("email").await?.paused);
    let err = inspector.pause_queue("email").await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueAlreadyPaused(_)));

    inspector.unpause_queue("email").await?;
    assert!(!inspector.queue_info("email").await?.paused);
    let err = inspector.unpause_queue("email").await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueNotPaused(_)));

    let err = inspector.pause_queue("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pauses_admit_exactly_one_winner() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;

    for round in 0..50 {
        let name = format!("q{round}");
        db::create_queue(&pool, &name, now_ms()).await?;

        let (a, b) = (inspector.clone(), inspector.clone());
        let (na, nb) = (name.clone(), name.clone());
        let first = tokio::spawn(async move { a.pause_queue(&na).await });
        let second = tokio::spawn(async move { b.pause_queue(&nb).await });
        let results = [first.await?, second.await?];

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1, "round {round}: {results:?}");
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(InspectorError::QueueAlreadyPaused(_))))
        );
        assert!(inspector.queue_info(&name).await?.paused);
    }
    Ok(())
}

#[tokio::test]
async fn pause_after_delete_is_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (pool, inspector) = setup(&dir).await?;
    db::create_queue(&pool, "gone", now_ms()).await?;
    inspector.delete_queue("gone", false).await?;

    let err = inspector.pause_queue("gone").await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueNotFound(_)));
    let err = inspector.unpause_queue("gone").await.unwrap_err();
    assert!(matches!(err, InspectorError::QueueNotFound(_)));
    Ok(())
}
