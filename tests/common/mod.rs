//! Shared helpers for integration tests: in-memory store construction
//! and event seeding.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::Arc;

use news_verification_backend::config::DatabaseSettings;
use news_verification_backend::models::article::NewArticle;
use news_verification_backend::models::event::{Category, ConflictSeverity};
use news_verification_backend::services::store::ScoreUpdate;
use news_verification_backend::{create_pool, run_migrations, EventStore};

pub async fn memory_store() -> Arc<EventStore> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let pool = create_pool(&settings).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    Arc::new(EventStore::new(pool))
}

pub fn new_article(
    url: &str,
    domain: &str,
    title: &str,
    timestamp: DateTime<Utc>,
) -> NewArticle {
    NewArticle {
        url: url.to_string(),
        source_domain: domain.to_string(),
        title: title.to_string(),
        summary: String::new(),
        snippet: String::new(),
        timestamp,
        language: "en".to_string(),
        entities: Vec::new(),
    }
}

pub fn score_update(
    truth: f64,
    importance: f64,
    category: Category,
    has_conflict: bool,
) -> ScoreUpdate {
    ScoreUpdate {
        truth_score: truth,
        importance_score: importance,
        coherence_score: if has_conflict { 40.0 } else { 90.0 },
        has_conflict,
        conflict_severity: if has_conflict {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::None
        },
        conflict_explanation: None,
        bias_compass: None,
        international_coverage: None,
        category,
        category_confidence: 0.8,
        politics_flag: category == Category::Politics,
        evidence_flag: false,
        official_match: false,
    }
}

/// Seed one event backed by a single article and an explicit score.
pub async fn seed_event(
    store: &EventStore,
    index: i64,
    truth: f64,
    importance: f64,
    category: Category,
    has_conflict: bool,
    timestamp: DateTime<Utc>,
) -> i64 {
    let article = new_article(
        &format!("https://seed{index}.com/article"),
        &format!("seed{index}.com"),
        &format!("Seeded event number {index}"),
        timestamp,
    );
    let article_id = store
        .insert_article(&article, timestamp)
        .await
        .expect("insert seed article");
    let event_id = store
        .create_or_get_event(&format!("Seeded event number {index}"), article_id)
        .await
        .expect("create event");
    store
        .commit_event_update(
            event_id,
            &[],
            Some(&score_update(truth, importance, category, has_conflict)),
        )
        .await
        .expect("commit seed scores");
    event_id
}
