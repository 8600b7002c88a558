//! Database pool setup and schema migrations
//!
//! SQLite via sqlx. The schema is created idempotently at startup; the
//! Event Store owns all reads and writes beyond this module.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseSettings;

/// Create a connection pool for the configured database.
///
/// In-memory databases are capped to one connection: every pooled
/// connection to `:memory:` would otherwise see its own empty database.
pub async fn create_pool(settings: &DatabaseSettings) -> Result<SqlitePool> {
    let max_connections = if settings.url.contains(":memory:") {
        1
    } else {
        settings.max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&settings.url)
        .await
        .with_context(|| format!("Failed to connect to database at {}", settings.url))?;

    Ok(pool)
}

/// Create the schema if it does not exist yet. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("Failed to run schema migrations")?;

    tracing::info!("Database schema ready");
    Ok(())
}

/// Cheap connectivity probe used by the health endpoint.
pub async fn health_check(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    summary TEXT NOT NULL,
    articles_count INTEGER NOT NULL DEFAULT 0,
    unique_sources INTEGER NOT NULL DEFAULT 0,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    truth_score REAL NOT NULL DEFAULT 0,
    importance_score REAL NOT NULL DEFAULT 0,
    coherence_score REAL NOT NULL DEFAULT 100,
    has_conflict INTEGER NOT NULL DEFAULT 0,
    conflict_severity TEXT NOT NULL DEFAULT 'none',
    conflict_explanation_json TEXT,
    bias_compass_json TEXT,
    international_coverage_json TEXT,
    category TEXT NOT NULL DEFAULT 'other',
    category_confidence REAL NOT NULL DEFAULT 0,
    politics_flag INTEGER NOT NULL DEFAULT 0,
    evidence_flag INTEGER NOT NULL DEFAULT 0,
    official_match INTEGER NOT NULL DEFAULT 0,
    geo_diversity REAL NOT NULL DEFAULT 0,
    retention_frozen INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_events_truth_score ON events (truth_score DESC);
CREATE INDEX IF NOT EXISTS idx_events_last_seen ON events (last_seen DESC);
CREATE INDEX IF NOT EXISTS idx_events_has_conflict ON events (has_conflict);
CREATE INDEX IF NOT EXISTS idx_events_politics_flag ON events (politics_flag);

CREATE TABLE IF NOT EXISTS articles_raw (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    source_domain TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    snippet TEXT NOT NULL DEFAULT '',
    timestamp TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    language TEXT NOT NULL DEFAULT 'en',
    entities_json TEXT NOT NULL DEFAULT '[]',
    cluster_id INTEGER REFERENCES events(id),
    embedding_blob BLOB,
    fact_check_status TEXT NOT NULL DEFAULT 'unchecked',
    fact_check_flags_json TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_articles_timestamp ON articles_raw (timestamp);
CREATE INDEX IF NOT EXISTS idx_articles_cluster_id ON articles_raw (cluster_id);
CREATE INDEX IF NOT EXISTS idx_articles_ingested_at ON articles_raw (ingested_at);

CREATE TABLE IF NOT EXISTS pipeline_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
