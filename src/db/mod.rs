use crate::models::{DailyStats, QueueRow, TaskState};
use anyhow::Context;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteExecutor};
use sqlx::{SqlitePool, migrate::Migrator};
use std::fs;
use std::path::Path;

/// Result of a conditional pause-flag update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Changed,
    NotFound,
    Unchanged,
}

/// Result of a guarded queue deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    NotEmpty,
}

/// List all queue names, ordered by name
pub async fn list_queue_names(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT name FROM queue ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_queue_by_name<'c>(
    conn: impl SqliteExecutor<'c>,
    name: &str,
) -> sqlx::Result<Option<QueueRow>> {
    sqlx::query_as::<_, QueueRow>("SELECT name, paused FROM queue WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await
}

pub async fn create_queue(pool: &SqlitePool, name: &str, now_ms: i64) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO queue (name, paused, created_at) VALUES (?, 0, ?)")
        .bind(name)
        .bind(now_ms)
        .execute(pool)
        .await?;
    Ok(())
}

/// Flip the paused flag in one transaction.
///
/// The update only matches a row whose flag differs from `paused`, so of two
/// concurrent callers exactly one sees `Changed`.
pub async fn set_paused(
    pool: &SqlitePool,
    name: &str,
    paused: bool,
) -> sqlx::Result<PauseOutcome> {
    let mut tx = pool.begin().await?;
    let res = sqlx::query("UPDATE queue SET paused = ? WHERE name = ? AND paused = ?")
        .bind(paused)
        .bind(name)
        .bind(!paused)
        .execute(&mut *tx)
        .await?;
    let outcome = if res.rows_affected() > 0 {
        PauseOutcome::Changed
    } else if get_queue_by_name(&mut *tx, name).await?.is_some() {
        PauseOutcome::Unchanged
    } else {
        PauseOutcome::NotFound
    };
    tx.commit().await?;
    Ok(outcome)
}

/// Insert a task row. Used by engines sharing the database and by tests.
pub async fn insert_task(
    pool: &SqlitePool,
    queue: &str,
    state: TaskState,
    payload: &str,
    enqueued_at: i64,
) -> sqlx::Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO task (queue, state, payload, enqueued_at) VALUES (?, ?, ?, ?)",
    )
    .bind(queue)
    .bind(state.as_str())
    .bind(payload)
    .bind(enqueued_at)
    .execute(pool)
    .await?;
    Ok(rec.last_insert_rowid())
}

/// Add to the processed/failed counters of one queue for one day
pub async fn record_daily_stats(
    pool: &SqlitePool,
    queue: &str,
    day: NaiveDate,
    processed: i64,
    failed: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO daily_stats (queue, day, processed, failed) VALUES (?, ?, ?, ?)
         ON CONFLICT (queue, day) DO UPDATE SET
             processed = processed + excluded.processed,
             failed = failed + excluded.failed",
    )
    .bind(queue)
    .bind(day)
    .bind(processed)
    .bind(failed)
    .execute(pool)
    .await?;
    Ok(())
}

/// Task counts per state for a queue
pub async fn count_tasks_by_state<'c>(
    conn: impl SqliteExecutor<'c>,
    queue: &str,
) -> sqlx::Result<Vec<(String, i64)>> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT state, COUNT(*) FROM task WHERE queue = ? GROUP BY state",
    )
    .bind(queue)
    .fetch_all(conn)
    .await
}

/// Enqueue time (ms) of the oldest pending task, if any
pub async fn oldest_pending_enqueued_at<'c>(
    conn: impl SqliteExecutor<'c>,
    queue: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT MIN(enqueued_at) FROM task WHERE queue = ? AND state = 'pending'",
    )
    .bind(queue)
    .fetch_one(conn)
    .await
}

/// Processed and failed counters for a single day
pub async fn stats_for_day<'c>(
    conn: impl SqliteExecutor<'c>,
    queue: &str,
    day: NaiveDate,
) -> sqlx::Result<Option<(i64, i64)>> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT processed, failed FROM daily_stats WHERE queue = ? AND day = ?",
    )
    .bind(queue)
    .bind(day)
    .fetch_optional(conn)
    .await
}

/// Processed and failed counters summed over every recorded day
pub async fn stats_totals<'c>(
    conn: impl SqliteExecutor<'c>,
    queue: &str,
) -> sqlx::Result<(i64, i64)> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COALESCE(SUM(processed), 0), COALESCE(SUM(failed), 0)
         FROM daily_stats WHERE queue = ?",
    )
    .bind(queue)
    .fetch_one(conn)
    .await
}

/// Recorded daily stats within `[from, to]`, oldest first
pub async fn stats_between<'c>(
    conn: impl SqliteExecutor<'c>,
    queue: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> sqlx::Result<Vec<DailyStats>> {
    sqlx::query_as::<_, DailyStats>(
        "SELECT queue, day, processed, failed FROM daily_stats
         WHERE queue = ? AND day >= ? AND day <= ?
         ORDER BY day",
    )
    .bind(queue)
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await
}

/// Delete a queue with its tasks and stats in one transaction.
///
/// Without `force`, any task that is not completed blocks the deletion.
/// With `force`, only active tasks do.
pub async fn delete_queue(pool: &SqlitePool, name: &str, force: bool) -> sqlx::Result<DeleteOutcome> {
    let mut tx = pool.begin().await?;

    let exists: Option<String> = sqlx::query_scalar("SELECT name FROM queue WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(DeleteOutcome::NotFound);
    }

    let blocking_sql = if force {
        "SELECT COUNT(*) FROM task WHERE queue = ? AND state = 'active'"
    } else {
        "SELECT COUNT(*) FROM task WHERE queue = ? AND state != 'completed'"
    };
    let blocking: i64 = sqlx::query_scalar(blocking_sql)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
    if blocking > 0 {
        return Ok(DeleteOutcome::NotEmpty);
    }

    sqlx::query("DELETE FROM task WHERE queue = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM daily_stats WHERE queue = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM queue WHERE name = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(DeleteOutcome::Deleted)
}

// Embed migrations from the `migrations` directory
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

fn connect_options(db_file: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
}

/// Create the database file (if missing) and bring the schema up to date.
pub async fn create_db_if_needed_at(db_file: &Path, force_recreate: bool) -> anyhow::Result<()> {
    if force_recreate && db_file.exists() {
        fs::remove_file(db_file)
            .with_context(|| format!("Failed to remove DB file at {}", db_file.display()))?;
    }
    if let Some(parent) = db_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let pool = SqlitePool::connect_with(connect_options(db_file))
        .await
        .context("Failed to connect to the database for migrations")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    pool.close().await;
    Ok(())
}

/// Initialize the SQLite connection pool for an existing database file.
pub async fn init_pool_at(db_file: &Path) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect_with(connect_options(db_file))
        .await
        .with_context(|| format!("Failed to connect to the database at {}", db_file.display()))?;
    Ok(pool)
}
