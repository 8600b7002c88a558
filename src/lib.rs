//! News Verification Backend
//!
//! Continuously ingests news-like feeds, groups near-duplicate articles
//! into events, scores each event's reliability, detects narrative
//! conflicts, and serves ranked events over a read-only query API with an
//! RSS syndication view.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::{AppConfig, ConfigError, SchedulerConfig};
pub use database::{create_pool, health_check as db_health_check, run_migrations};
pub use error::{ApiError, ApiResult, FetchError, StoreError};
pub use services::{
    fact_check::{DisabledFactChecker, FactChecker},
    ingestion::build_sources,
    processing::{default_embedder, ClusterParams, Clusterer, Normalizer},
    ranking::{Ranker, Section},
    scheduler::{PipelineScheduler, SchedulerHandle},
    scoring::Scorer,
    store::{EventFilter, EventStore},
};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,
    pub scorer: Arc<Scorer>,
    pub config: Arc<AppConfig>,
    /// Present only when the scheduler is enabled for this process.
    pub scheduler: Option<Arc<PipelineScheduler>>,
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.config.server.request_timeout;
    let cors = create_cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/events", get(handlers::events::list_events))
        .route("/events/conflicts", get(handlers::events::list_conflicts))
        .route("/events/search", get(handlers::events::search_events))
        .route("/events/stats/summary", get(handlers::events::stats_summary))
        .route("/events/flagged", get(handlers::events::flagged_articles))
        .route(
            "/events/polarizing-sources",
            get(handlers::events::polarizing_sources),
        )
        .route("/events/:id", get(handlers::events::get_event))
        .route("/feeds/verified.xml", get(handlers::feeds::rss_verified))
        .route("/health", get(handlers::health::health))
        .layer(axum::middleware::from_fn_with_state(
            request_timeout,
            request_deadline_middleware,
        ))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Abort handlers that exceed the client deadline and answer 504.
async fn request_deadline_middleware(
    State(timeout): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::Timeout.into_response(),
    }
}

/// CORS from the configured origin list; an empty list means no
/// cross-origin access.
fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
}
