use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// Point-in-time view of one queue as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInfo {
    pub queue: String,
    /// Tasks in any state other than completed.
    pub size: i64,
    /// Age of the oldest pending task.
    pub latency: Duration,
    pub active: i64,
    pub pending: i64,
    pub scheduled: i64,
    pub retry: i64,
    pub archived: i64,
    pub completed: i64,
    /// Processed today, failures included.
    pub processed: i64,
    /// Failed today.
    pub failed: i64,
    pub processed_total: i64,
    pub failed_total: i64,
    pub paused: bool,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate counters for one queue on one calendar day.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailyStats {
    pub queue: String,
    pub processed: i64,
    pub failed: i64,
    #[sqlx(rename = "day")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueRow {
    pub name: String,
    pub paused: bool,
}

/// Lifecycle state of a task, as stored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Active,
    Scheduled,
    Retry,
    Archived,
    Completed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Active => "active",
            TaskState::Scheduled => "scheduled",
            TaskState::Retry => "retry",
            TaskState::Archived => "archived",
            TaskState::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskState::Pending),
            "active" => Some(TaskState::Active),
            "scheduled" => Some(TaskState::Scheduled),
            "retry" => Some(TaskState::Retry),
            "archived" => Some(TaskState::Archived),
            "completed" => Some(TaskState::Completed),
            _ => None,
        }
    }
}
