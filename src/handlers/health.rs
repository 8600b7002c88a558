//! Health endpoint
//!
//! The only externally visible signal of internal degradation: database
//! connectivity, per-tier worker freshness, and row counts.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Most recent successful tier completion, if any.
    pub worker_last_run: Option<String>,
    /// Per-tier completion times.
    pub workers: HashMap<String, String>,
    pub total_events: i64,
    pub total_articles: i64,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let db_connected = crate::database::health_check(state.store.pool()).await;

    let (workers, total_events, total_articles) = if db_connected {
        let workers = state.store.worker_last_runs().await.unwrap_or_default();
        let summary = state.store.stats_summary().await;
        match summary {
            Ok(summary) => (workers, summary.total_events, summary.total_articles),
            Err(_) => (workers, 0, 0),
        }
    } else {
        (HashMap::new(), 0, 0)
    };

    let worker_last_run = workers.values().max().cloned();

    Ok(Json(HealthResponse {
        status: if db_connected { "ok" } else { "degraded" },
        database: if db_connected { "connected" } else { "error" },
        worker_last_run,
        workers,
        total_events,
        total_articles,
    }))
}
