use crate::error::InspectorError;
use crate::inspector::{self, Config, Inspector, SqliteInspector};
use crate::transform::{
    DailyStatsResponse, QueueStateSnapshot, to_daily_stats_list, to_queue_state_snapshot,
};
use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// Days of history returned alongside a single queue.
pub const QUEUE_HISTORY_DAYS: u32 = 10;
/// Days of history returned per queue by the stats listing.
pub const STATS_HISTORY_DAYS: u32 = 90;

pub type AppState = Arc<dyn Inspector>;

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Run the HTTP server on the given port
pub async fn run_server(port: u16, cfg: Config) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let pool = inspector::init_pool(&cfg).await?;
    let app = app_router(Arc::new(SqliteInspector::new(pool)));

    // Allow overriding bind address via env (useful for Docker). Default 127.0.0.1
    let bind_ip = std::env::var("QSCOPE_BIND").unwrap_or_else(|_| "127.0.0.1".to_string());
    let ip: IpAddr = bind_ip
        .parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    let addr = SocketAddr::from((ip, port));
    tracing::info!("Listening on {} (db: {}) - Use Ctrl+C to quit.", addr, cfg.db_path.display());
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind address: {e}");
        anyhow!("Bind error: {e}")
    })?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await
        .map_err(|e| {
            tracing::error!("Server error: {e}");
            anyhow!("Server error: {e}")
        })?;
    Ok(())
}

/// Construct the Axum `Router` for the service around a queue inspector.
pub fn app_router(inspector: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/queues", get(list_queues))
        .route("/queues/stats", get(list_queue_stats))
        .route("/queues/{qname}", get(get_queue).delete(delete_queue))
        .route("/queues/{qname}/pause", post(pause_queue))
        .route("/queues/{qname}/resume", post(resume_queue))
        .with_state(inspector)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListQueuesResponse {
    pub queues: Vec<QueueStateSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetQueueResponse {
    pub current: QueueStateSnapshot,
    pub history: Vec<DailyStatsResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListQueueStatsResponse {
    pub stats: BTreeMap<String, Vec<DailyStatsResponse>>,
}

fn internal_error(e: InspectorError) -> (StatusCode, String) {
    tracing::error!("Inspector error: {e}");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// List a snapshot of every queue; one failure fails the whole listing
async fn list_queues(State(inspector): State<AppState>) -> ApiResult<Json<ListQueuesResponse>> {
    let names = inspector.queues().await.map_err(internal_error)?;
    let mut queues = Vec::with_capacity(names.len());
    for name in &names {
        let info = inspector.queue_info(name).await.map_err(internal_error)?;
        queues.push(to_queue_state_snapshot(&info));
    }
    Ok(Json(ListQueuesResponse { queues }))
}

// Current snapshot plus recent history of one queue
async fn get_queue(
    Path(qname): Path<String>,
    State(inspector): State<AppState>,
) -> ApiResult<Json<GetQueueResponse>> {
    // An unknown queue surfaces as 500 here, not 404.
    let info = inspector.queue_info(&qname).await.map_err(internal_error)?;
    let history = inspector
        .history(&qname, QUEUE_HISTORY_DAYS)
        .await
        .map_err(internal_error)?;
    Ok(Json(GetQueueResponse {
        current: to_queue_state_snapshot(&info),
        history: to_daily_stats_list(&history),
    }))
}

// Delete an empty queue
async fn delete_queue(
    Path(qname): Path<String>,
    State(inspector): State<AppState>,
) -> ApiResult<StatusCode> {
    match inspector.delete_queue(&qname, false).await {
        Ok(()) => {
            tracing::info!("Deleted queue '{qname}'");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e @ InspectorError::QueueNotFound(_)) => {
            tracing::warn!("{e}");
            Err((StatusCode::NOT_FOUND, e.to_string()))
        }
        Err(e @ InspectorError::QueueNotEmpty(_)) => {
            tracing::warn!("{e}");
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => Err(internal_error(e)),
    }
}

async fn pause_queue(
    Path(qname): Path<String>,
    State(inspector): State<AppState>,
) -> ApiResult<StatusCode> {
    inspector.pause_queue(&qname).await.map_err(internal_error)?;
    tracing::info!("Paused queue '{qname}'");
    Ok(StatusCode::NO_CONTENT)
}

async fn resume_queue(
    Path(qname): Path<String>,
    State(inspector): State<AppState>,
) -> ApiResult<StatusCode> {
    inspector.unpause_queue(&qname).await.map_err(internal_error)?;
    tracing::info!("Resumed queue '{qname}'");
    Ok(StatusCode::NO_CONTENT)
}

/// Daily stats for every enumerated queue; the first failure aborts the batch.
pub async fn collect_queue_stats(
    inspector: &dyn Inspector,
) -> Result<ListQueueStatsResponse, InspectorError> {
    let mut stats = BTreeMap::new();
    for name in inspector.queues().await? {
        let history = inspector.history(&name, STATS_HISTORY_DAYS).await?;
        stats.insert(name, to_daily_stats_list(&history));
    }
    Ok(ListQueueStatsResponse { stats })
}

// Long-range daily stats for every queue, keyed by queue name
async fn list_queue_stats(
    State(inspector): State<AppState>,
) -> ApiResult<Json<ListQueueStatsResponse>> {
    let resp = collect_queue_stats(inspector.as_ref())
        .await
        .map_err(internal_error)?;
    Ok(Json(resp))
}
