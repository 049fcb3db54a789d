//! Conversion from engine-native types to the JSON shapes served over HTTP.
//!
//! The wire types here are the API contract. They are kept separate from
//! [`crate::models`] so the engine side can change without breaking clients.

use crate::models::{DailyStats, QueueInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStateSnapshot {
    pub queue: String,
    pub size: i64,
    pub latency_msec: i64,
    /// Latency rounded to 10ms, e.g. "1.25s".
    pub display_latency: String,
    pub active: i64,
    pub pending: i64,
    pub scheduled: i64,
    pub retry: i64,
    pub archived: i64,
    pub completed: i64,
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub processed_total: i64,
    pub succeeded_total: i64,
    pub failed_total: i64,
    pub paused: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatsResponse {
    pub queue: String,
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    /// Calendar day as `YYYY-MM-DD`.
    pub date: String,
}

pub fn to_queue_state_snapshot(info: &QueueInfo) -> QueueStateSnapshot {
    QueueStateSnapshot {
        queue: info.queue.clone(),
        size: info.size,
        latency_msec: i64::try_from(info.latency.as_millis()).unwrap_or(i64::MAX),
        display_latency: display_latency(info.latency),
        active: info.active,
        pending: info.pending,
        scheduled: info.scheduled,
        retry: info.retry,
        archived: info.archived,
        completed: info.completed,
        processed: info.processed,
        succeeded: succeeded(info.processed, info.failed),
        failed: info.failed,
        processed_total: info.processed_total,
        succeeded_total: succeeded(info.processed_total, info.failed_total),
        failed_total: info.failed_total,
        paused: info.paused,
        timestamp: info.timestamp,
    }
}

pub fn to_daily_stats(stats: &DailyStats) -> DailyStatsResponse {
    DailyStatsResponse {
        queue: stats.queue.clone(),
        processed: stats.processed,
        succeeded: succeeded(stats.processed, stats.failed),
        failed: stats.failed,
        date: stats.date.format("%Y-%m-%d").to_string(),
    }
}

pub fn to_daily_stats_list(stats: &[DailyStats]) -> Vec<DailyStatsResponse> {
    stats.iter().map(to_daily_stats).collect()
}

fn succeeded(processed: i64, failed: i64) -> i64 {
    processed.saturating_sub(failed).max(0)
}

/// Render a duration rounded to the nearest 10ms: "0s", "450ms", "1.25s", "2m3s", "1h0m0s".
fn display_latency(d: Duration) -> String {
    let ms = ((d.as_millis() + 5) / 10 * 10) as u64;
    if ms == 0 {
        return "0s".to_string();
    }
    if ms < 1000 {
        return format!("{ms}ms");
    }

    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let secs_ms = ms % 60_000;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    let whole = secs_ms / 1000;
    let frac = secs_ms % 1000;
    if frac == 0 {
        out.push_str(&format!("{whole}s"));
    } else {
        let frac = format!("{frac:03}");
        out.push_str(&format!("{whole}.{}s", frac.trim_end_matches('0')));
    }
    out
}
