//! Queue client contract and the SQLite-backed implementation.
//!
//! Handlers only see the [`Inspector`] trait. [`SqliteInspector`] reads and
//! administers queue state kept by an engine in a shared SQLite database.

use crate::db::{self, DeleteOutcome, PauseOutcome};
use crate::error::{InspectorError, Result};
use crate::models::{DailyStats, QueueInfo, QueueRow, TaskState};
use async_trait::async_trait;
use chrono::{Days, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteExecutor;
use std::path::PathBuf;
use std::time::Duration;

/// Read and administrative access to the engine's queues.
#[async_trait]
pub trait Inspector: Send + Sync {
    /// All queue names known to the engine.
    async fn queues(&self) -> Result<Vec<String>>;

    /// Current snapshot of one queue.
    async fn queue_info(&self, queue: &str) -> Result<QueueInfo>;

    /// Daily stats for at most the last `days` days, oldest first.
    async fn history(&self, queue: &str, days: u32) -> Result<Vec<DailyStats>>;

    /// Remove a queue. Fails with `QueueNotEmpty` unless the queue is empty
    /// or `force` is set.
    async fn delete_queue(&self, queue: &str, force: bool) -> Result<()>;

    async fn pause_queue(&self, queue: &str) -> Result<()>;

    async fn unpause_queue(&self, queue: &str) -> Result<()>;
}

/// Configuration for the backing database
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub force_recreate: bool,
}

impl Default for Config {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { db_path: cwd.join("qscope.db"), force_recreate: false }
    }
}

/// Initialize the pool, ensuring the database and schema exist first.
pub async fn init_pool(cfg: &Config) -> anyhow::Result<SqlitePool> {
    db::create_db_if_needed_at(&cfg.db_path, cfg.force_recreate).await?;
    let pool = db::init_pool_at(&cfg.db_path).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct SqliteInspector {
    pool: SqlitePool,
}

impl SqliteInspector {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn queue_row<'c>(conn: impl SqliteExecutor<'c>, queue: &str) -> Result<QueueRow> {
    db::get_queue_by_name(conn, queue)
        .await?
        .ok_or_else(|| InspectorError::QueueNotFound(queue.to_string()))
}

#[async_trait]
impl Inspector for SqliteInspector {
    async fn queues(&self) -> Result<Vec<String>> {
        Ok(db::list_queue_names(&self.pool).await?)
    }

    async fn queue_info(&self, queue: &str) -> Result<QueueInfo> {
        // One read transaction so counters and totals come from the same snapshot.
        let mut tx = self.pool.begin().await?;
        let row = queue_row(&mut *tx, queue).await?;
        let now = Utc::now();

        let mut info = QueueInfo {
            queue: row.name,
            size: 0,
            latency: Duration::ZERO,
            active: 0,
            pending: 0,
            scheduled: 0,
            retry: 0,
            archived: 0,
            completed: 0,
            processed: 0,
            failed: 0,
            processed_total: 0,
            failed_total: 0,
            paused: row.paused,
            timestamp: now,
        };

        for (state, count) in db::count_tasks_by_state(&mut *tx, queue).await? {
            match TaskState::parse(&state) {
                Some(TaskState::Pending) => info.pending = count,
                Some(TaskState::Active) => info.active = count,
                Some(TaskState::Scheduled) => info.scheduled = count,
                Some(TaskState::Retry) => info.retry = count,
                Some(TaskState::Archived) => info.archived = count,
                Some(TaskState::Completed) => info.completed = count,
                None => {
                    return Err(InspectorError::Internal(format!(
                        "unknown task state '{state}' in queue '{queue}'"
                    )));
                }
            }
        }
        info.size = info.pending + info.active + info.scheduled + info.retry + info.archived;

        if let Some(oldest) = db::oldest_pending_enqueued_at(&mut *tx, queue).await? {
            let age_ms = now.timestamp_millis().saturating_sub(oldest).max(0);
            info.latency = Duration::from_millis(age_ms as u64);
        }

        if let Some((processed, failed)) =
            db::stats_for_day(&mut *tx, queue, now.date_naive()).await?
        {
            info.processed = processed;
            info.failed = failed;
        }
        let (processed_total, failed_total) = db::stats_totals(&mut *tx, queue).await?;
        info.processed_total = processed_total;
        info.failed_total = failed_total;

        tx.commit().await?;
        Ok(info)
    }

    async fn history(&self, queue: &str, days: u32) -> Result<Vec<DailyStats>> {
        let mut tx = self.pool.begin().await?;
        queue_row(&mut *tx, queue).await?;
        if days == 0 {
            return Ok(Vec::new());
        }
        let today = Utc::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| {
                InspectorError::Internal(format!("history window of {days} days is out of range"))
            })?;
        let mut stats = db::stats_between(&mut *tx, queue, from, today).await?;
        tx.commit().await?;
        stats.truncate(days as usize);
        Ok(stats)
    }

    async fn delete_queue(&self, queue: &str, force: bool) -> Result<()> {
        match db::delete_queue(&self.pool, queue, force).await? {
            DeleteOutcome::Deleted => Ok(()),
            DeleteOutcome::NotFound => Err(InspectorError::QueueNotFound(queue.to_string())),
            DeleteOutcome::NotEmpty => Err(InspectorError::QueueNotEmpty(queue.to_string())),
        }
    }

    async fn pause_queue(&self, queue: &str) -> Result<()> {
        match db::set_paused(&self.pool, queue, true).await? {
            PauseOutcome::Changed => Ok(()),
            PauseOutcome::NotFound => Err(InspectorError::QueueNotFound(queue.to_string())),
            PauseOutcome::Unchanged => Err(InspectorError::QueueAlreadyPaused(queue.to_string())),
        }
    }

    async fn unpause_queue(&self, queue: &str) -> Result<()> {
        match db::set_paused(&self.pool, queue, false).await? {
            PauseOutcome::Changed => Ok(()),
            PauseOutcome::NotFound => Err(InspectorError::QueueNotFound(queue.to_string())),
            PauseOutcome::Unchanged => Err(InspectorError::QueueNotPaused(queue.to_string())),
        }
    }
}
