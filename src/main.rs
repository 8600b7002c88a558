//! Service entry point: configuration, database, pipeline scheduler, and
//! the query API server.

use std::sync::Arc;

use news_verification_backend::services::processing::{
    default_embedder, ClusterParams, Clusterer, Normalizer,
};
use news_verification_backend::services::processing::normalizer::NormalizerConfig;
use news_verification_backend::{
    build_sources, create_pool, create_router, run_migrations, AppConfig, AppState,
    DisabledFactChecker, EventStore, PipelineScheduler, Scorer,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let store = Arc::new(EventStore::new(pool));
    let scorer = Arc::new(Scorer::default());
    let embedder = default_embedder();
    let normalizer = Arc::new(Normalizer::new(store.clone(), NormalizerConfig::default()));
    let clusterer = Arc::new(Clusterer::new(
        store.clone(),
        embedder,
        scorer.clone(),
        ClusterParams::default(),
    ));

    let mut scheduler = None;
    let mut scheduler_handle = None;
    if config.scheduler.enabled {
        let sources = build_sources(&config);
        let pipeline = Arc::new(PipelineScheduler::new(
            store.clone(),
            sources,
            normalizer,
            clusterer,
            scorer.clone(),
            Arc::new(DisabledFactChecker),
            config.scheduler.clone(),
        ));
        scheduler_handle = Some(pipeline.clone().start());
        scheduler = Some(pipeline);
        tracing::info!("Pipeline scheduler started");
    } else {
        tracing::info!("Pipeline scheduler disabled (set ENABLE_SCHEDULER=true to enable)");
    }

    let state = AppState {
        store,
        scorer,
        config: config.clone(),
        scheduler,
    };
    let router = create_router(state);

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Query API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the scheduler before exiting.
    if let Some(handle) = scheduler_handle {
        handle.stop().await;
        tracing::info!("Pipeline scheduler stopped");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install shutdown handler");
    }
}
