//! Event Store
//!
//! The only owner of article and event rows. All mutating operations are
//! transactional; writers touching the same event serialize on a per-event
//! lock so a reader never observes an event whose membership grew without
//! its scores being recomputed in the same commit.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::article::{embedding_to_blob, Article, ArticleRow, FactCheckFlag, NewArticle};
use crate::models::event::{
    BiasCompass, Category, ConflictExplanation, ConflictSeverity, Event, EventRow,
    InternationalCoverage,
};

/// Scoring output applied to an event inside the same transaction as the
/// membership update that produced it.
#[derive(Debug, Clone)]
pub struct ScoreUpdate {
    pub truth_score: f64,
    pub importance_score: f64,
    pub coherence_score: f64,
    pub has_conflict: bool,
    pub conflict_severity: ConflictSeverity,
    pub conflict_explanation: Option<ConflictExplanation>,
    pub bias_compass: Option<BiasCompass>,
    pub international_coverage: Option<InternationalCoverage>,
    pub category: Category,
    pub category_confidence: f64,
    pub politics_flag: bool,
    pub evidence_flag: bool,
    pub official_match: bool,
}

/// Filter applied before pagination on every event listing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub min_truth: Option<f64>,
    pub max_truth: Option<f64>,
    pub politics_only: bool,
    pub has_conflict: Option<bool>,
    /// Case-insensitive substring over summary and member entities.
    pub search: Option<String>,
    pub last_seen_after: Option<DateTime<Utc>>,
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpiryOutcome {
    pub articles_removed: u64,
    pub events_frozen: u64,
}

/// One row of the polarizing-sources ranking.
#[derive(Debug, Clone, Serialize)]
pub struct PolarizingSource {
    pub source_domain: String,
    pub articles_count: i64,
    pub conflicted_count: i64,
    /// Share of the source's articles sitting in conflicted events.
    pub polarization_score: f64,
}

/// Aggregate counts for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub total_events: i64,
    pub total_articles: i64,
    pub confirmed_events: i64,
    pub developing_events: i64,
    pub unverified_events: i64,
    pub conflicted_events: i64,
    pub last_ingestion: Option<DateTime<Utc>>,
}

/// Transactional store over articles and events.
pub struct EventStore {
    pool: SqlitePool,
    /// Per-event write locks; membership and scores commit together.
    event_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl EventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            event_locks: DashMap::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn event_lock(&self, event_id: i64) -> Arc<Mutex<()>> {
        self.event_locks
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---- articles ----------------------------------------------------

    /// Insert a normalized article. Fails with `DuplicateUrl` when the
    /// canonical URL already exists; the first writer always wins.
    pub async fn insert_article(
        &self,
        article: &NewArticle,
        ingested_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let entities_json =
            serde_json::to_string(&article.entities).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"INSERT INTO articles_raw
               (url, source_domain, title, summary, snippet, timestamp, ingested_at,
                language, entities_json, fact_check_status, fact_check_flags_json)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'unchecked', '[]')"#,
        )
        .bind(&article.url)
        .bind(&article.source_domain)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.snippet)
        .bind(article.timestamp)
        .bind(ingested_at)
        .bind(&article.language)
        .bind(&entities_json)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateUrl(article.url.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_article(&self, id: i64) -> Result<Article, StoreError> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles_raw WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("article {id}")))?;
        Ok(row.into())
    }

    pub async fn article_url_exists(&self, url: &str) -> Result<bool, StoreError> {
        let found = sqlx::query("SELECT 1 FROM articles_raw WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Titles from the same domain ingested within the dedup window.
    pub async fn recent_titles_for_domain(
        &self,
        source_domain: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT title FROM articles_raw WHERE source_domain = ? AND ingested_at >= ?",
        )
        .bind(source_domain)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("title")).collect())
    }

    /// All articles ingested after `since`, oldest first.
    pub async fn articles_ingested_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles_raw WHERE ingested_at >= ? ORDER BY ingested_at ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn articles_for_event(&self, event_id: i64) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles_raw WHERE cluster_id = ? ORDER BY timestamp ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Persist a lazily computed embedding. First writer wins; a later
    /// write against an already-populated row is a no-op.
    pub async fn set_embedding(
        &self,
        article_id: i64,
        embedding: &[f32],
    ) -> Result<bool, StoreError> {
        let done = sqlx::query(
            "UPDATE articles_raw SET embedding_blob = ? WHERE id = ? AND embedding_blob IS NULL",
        )
        .bind(embedding_to_blob(embedding))
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn set_fact_check(
        &self,
        article_id: i64,
        status: &str,
        flags: &[FactCheckFlag],
    ) -> Result<(), StoreError> {
        let flags_json = serde_json::to_string(flags).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "UPDATE articles_raw SET fact_check_status = ?, fact_check_flags_json = ? WHERE id = ?",
        )
        .bind(status)
        .bind(flags_json)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Unchecked articles belonging to the most important events, for the
    /// deep-analysis tier.
    pub async fn unchecked_articles_by_importance(
        &self,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"SELECT a.* FROM articles_raw a
               JOIN events e ON a.cluster_id = e.id
               WHERE a.fact_check_status = 'unchecked'
               ORDER BY e.importance_score DESC, a.id ASC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Articles whose fact-check produced the given verdicts.
    pub async fn flagged_articles(
        &self,
        statuses: &[&str],
        source: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Article>), StoreError> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM articles_raw WHERE ");
        let mut list_builder = QueryBuilder::new("SELECT * FROM articles_raw WHERE ");

        for builder in [&mut count_builder, &mut list_builder] {
            builder.push("fact_check_status IN (");
            let mut separated = builder.separated(", ");
            for status in statuses {
                separated.push_bind(status.to_string());
            }
            builder.push(")");
            if let Some(domain) = source {
                builder
                    .push(" AND source_domain = ")
                    .push_bind(domain.to_string());
            }
            if let Some(cutoff) = since {
                builder.push(" AND ingested_at >= ").push_bind(cutoff);
            }
        }

        let total: i64 = count_builder.build().fetch_one(&self.pool).await?.get(0);

        list_builder
            .push(" ORDER BY ingested_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = list_builder
            .build_query_as::<ArticleRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((total, rows.into_iter().map(Into::into).collect()))
    }

    // ---- events ------------------------------------------------------

    pub async fn get_event(&self, id: i64) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;
        Ok(row.into())
    }

    /// Create an event seeded by one article, or return the event the seed
    /// already belongs to.
    pub async fn create_or_get_event(
        &self,
        summary: &str,
        seed_article_id: i64,
    ) -> Result<i64, StoreError> {
        let seed = self.get_article(seed_article_id).await?;
        if let Some(event_id) = seed.cluster_id {
            return Ok(event_id);
        }

        let mut tx = self.pool.begin().await?;
        let done = sqlx::query(
            "INSERT INTO events (summary, first_seen, last_seen) VALUES (?, ?, ?)",
        )
        .bind(summary)
        .bind(seed.timestamp)
        .bind(seed.timestamp)
        .execute(&mut *tx)
        .await?;
        let event_id = done.last_insert_rowid();

        sqlx::query("UPDATE articles_raw SET cluster_id = ? WHERE id = ?")
            .bind(event_id)
            .bind(seed_article_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(event_id)
    }

    /// Assign an article to an event. Idempotent; the referenced event
    /// must exist.
    pub async fn assign_cluster(&self, article_id: i64, event_id: i64) -> Result<(), StoreError> {
        let exists = sqlx::query("SELECT 1 FROM events WHERE id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::InvariantViolation(format!(
                "assign_cluster references missing event {event_id}"
            )));
        }

        sqlx::query("UPDATE articles_raw SET cluster_id = ? WHERE id = ?")
            .bind(event_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Membership + scoring commit: assigns the given members, recomputes
    /// the derived fields, and applies the score update, all in a single
    /// transaction under the per-event lock.
    pub async fn commit_event_update(
        &self,
        event_id: i64,
        new_member_ids: &[i64],
        scores: Option<&ScoreUpdate>,
    ) -> Result<Event, StoreError> {
        let lock = self.event_lock(event_id);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT retention_frozen FROM events WHERE id = ?")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = exists else {
            return Err(StoreError::InvariantViolation(format!(
                "commit_event_update references missing event {event_id}"
            )));
        };
        let frozen: bool = row.get::<bool, _>("retention_frozen");

        for article_id in new_member_ids {
            sqlx::query("UPDATE articles_raw SET cluster_id = ? WHERE id = ?")
                .bind(event_id)
                .bind(article_id)
                .execute(&mut *tx)
                .await?;
        }

        // Derived fields from the current membership.
        let members = sqlx::query(
            "SELECT source_domain, timestamp FROM articles_raw WHERE cluster_id = ?",
        )
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await?;

        if !members.is_empty() {
            let count = members.len() as i64;
            let mut domains = HashSet::new();
            let mut tlds = HashSet::new();
            let mut first: Option<DateTime<Utc>> = None;
            let mut last: Option<DateTime<Utc>> = None;
            for member in &members {
                let domain: String = member.get("source_domain");
                if let Some(tld) = domain.rsplit('.').next() {
                    tlds.insert(tld.to_string());
                }
                domains.insert(domain);
                let ts: DateTime<Utc> = member.get("timestamp");
                first = Some(first.map_or(ts, |f| f.min(ts)));
                last = Some(last.map_or(ts, |l| l.max(ts)));
            }
            let unique_sources = domains.len() as i64;
            let geo_diversity = (tlds.len() as f64 / 4.0).min(1.0);

            if frozen {
                // Counts never recompute downward after retention expiry.
                sqlx::query(
                    r#"UPDATE events SET
                       articles_count = MAX(articles_count, ?),
                       unique_sources = MAX(unique_sources, ?),
                       first_seen = MIN(first_seen, ?),
                       last_seen = MAX(last_seen, ?),
                       geo_diversity = ?
                       WHERE id = ?"#,
                )
                .bind(count)
                .bind(unique_sources)
                .bind(first)
                .bind(last)
                .bind(geo_diversity)
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    r#"UPDATE events SET
                       articles_count = ?, unique_sources = ?,
                       first_seen = ?, last_seen = ?, geo_diversity = ?
                       WHERE id = ?"#,
                )
                .bind(count)
                .bind(unique_sources)
                .bind(first)
                .bind(last)
                .bind(geo_diversity)
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(update) = scores {
            let conflict_json = update
                .conflict_explanation
                .as_ref()
                .and_then(|c| serde_json::to_string(c).ok());
            let compass_json = update
                .bias_compass
                .as_ref()
                .and_then(|c| serde_json::to_string(c).ok());
            let coverage_json = update
                .international_coverage
                .as_ref()
                .and_then(|c| serde_json::to_string(c).ok());

            sqlx::query(
                r#"UPDATE events SET
                   truth_score = ?, importance_score = ?, coherence_score = ?,
                   has_conflict = ?, conflict_severity = ?, conflict_explanation_json = ?,
                   bias_compass_json = ?, international_coverage_json = ?,
                   category = ?, category_confidence = ?, politics_flag = ?,
                   evidence_flag = ?, official_match = ?
                   WHERE id = ?"#,
            )
            .bind(update.truth_score)
            .bind(update.importance_score)
            .bind(update.coherence_score)
            .bind(update.has_conflict)
            .bind(update.conflict_severity.as_str())
            .bind(conflict_json)
            .bind(compass_json)
            .bind(coverage_json)
            .bind(update.category.as_str())
            .bind(update.category_confidence)
            .bind(update.politics_flag)
            .bind(update.evidence_flag)
            .bind(update.official_match)
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_event(event_id).await
    }

    /// Recompute the derived fields of an event without touching scores.
    pub async fn recompute_event(&self, event_id: i64) -> Result<Event, StoreError> {
        self.commit_event_update(event_id, &[], None).await
    }

    /// Filtered, unranked candidate set. Filters apply here, before any
    /// pagination happens in the ranking layer.
    pub async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT * FROM events WHERE 1 = 1");

        if let Some(min) = filter.min_truth {
            builder.push(" AND truth_score >= ").push_bind(min);
        }
        if let Some(max) = filter.max_truth {
            builder.push(" AND truth_score < ").push_bind(max);
        }
        if filter.politics_only {
            builder.push(" AND politics_flag = 1");
        }
        if let Some(conflict) = filter.has_conflict {
            builder.push(" AND has_conflict = ").push_bind(conflict);
        }
        if let Some(after) = filter.last_seen_after {
            builder.push(" AND last_seen >= ").push_bind(after);
        }
        if let Some(q) = &filter.search {
            let needle = format!("%{}%", q.to_lowercase());
            builder
                .push(" AND (lower(summary) LIKE ")
                .push_bind(needle.clone())
                .push(" OR id IN (SELECT cluster_id FROM articles_raw WHERE cluster_id IS NOT NULL AND lower(entities_json) LIKE ")
                .push_bind(needle)
                .push("))");
        }

        builder.push(" ORDER BY last_seen DESC, id ASC");

        let rows = builder
            .build_query_as::<EventRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Events whose membership changed since `since`, most recent first.
    pub async fn events_updated_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT * FROM events WHERE last_seen >= ? ORDER BY last_seen DESC, id ASC LIMIT ?",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ---- retention ---------------------------------------------------

    /// Remove articles ingested before the cutoff and freeze the counts of
    /// every touched event so they are not recomputed downward.
    pub async fn expire_articles(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<ExpiryOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            "SELECT DISTINCT cluster_id FROM articles_raw
             WHERE ingested_at < ? AND cluster_id IS NOT NULL",
        )
        .bind(older_than)
        .fetch_all(&mut *tx)
        .await?;
        let touched_ids: Vec<i64> = touched
            .iter()
            .map(|row| row.get::<i64, _>("cluster_id"))
            .collect();

        let deleted = sqlx::query("DELETE FROM articles_raw WHERE ingested_at < ?")
            .bind(older_than)
            .execute(&mut *tx)
            .await?;

        for event_id in &touched_ids {
            sqlx::query("UPDATE events SET retention_frozen = 1 WHERE id = ?")
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(ExpiryOutcome {
            articles_removed: deleted.rows_affected(),
            events_frozen: touched_ids.len() as u64,
        })
    }

    // ---- aggregates --------------------------------------------------

    pub async fn stats_summary(&self) -> Result<StatsSummary, StoreError> {
        let event_counts = sqlx::query(
            r#"SELECT COUNT(*) AS total,
                      SUM(CASE WHEN truth_score >= 75 THEN 1 ELSE 0 END) AS confirmed,
                      SUM(CASE WHEN truth_score >= 40 AND truth_score < 75 THEN 1 ELSE 0 END) AS developing,
                      SUM(CASE WHEN truth_score < 40 THEN 1 ELSE 0 END) AS unverified,
                      SUM(CASE WHEN has_conflict = 1 THEN 1 ELSE 0 END) AS conflicted
               FROM events"#,
        )
        .fetch_one(&self.pool)
        .await?;

        let article_counts =
            sqlx::query("SELECT COUNT(*) AS total, MAX(ingested_at) AS last_ingestion FROM articles_raw")
                .fetch_one(&self.pool)
                .await?;

        Ok(StatsSummary {
            total_events: event_counts.get::<i64, _>("total"),
            confirmed_events: event_counts.get::<Option<i64>, _>("confirmed").unwrap_or(0),
            developing_events: event_counts.get::<Option<i64>, _>("developing").unwrap_or(0),
            unverified_events: event_counts.get::<Option<i64>, _>("unverified").unwrap_or(0),
            conflicted_events: event_counts.get::<Option<i64>, _>("conflicted").unwrap_or(0),
            total_articles: article_counts.get::<i64, _>("total"),
            last_ingestion: article_counts.get::<Option<DateTime<Utc>>, _>("last_ingestion"),
        })
    }

    /// Sources ranked by the share of their articles that sit in
    /// conflicted events.
    pub async fn polarizing_sources(
        &self,
        min_articles: i64,
        limit: i64,
    ) -> Result<Vec<PolarizingSource>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT a.source_domain,
                      COUNT(*) AS articles_count,
                      SUM(CASE WHEN e.has_conflict = 1 THEN 1 ELSE 0 END) AS conflicted_count
               FROM articles_raw a
               JOIN events e ON a.cluster_id = e.id
               GROUP BY a.source_domain
               HAVING COUNT(*) >= ?
               ORDER BY CAST(SUM(CASE WHEN e.has_conflict = 1 THEN 1 ELSE 0 END) AS REAL) / COUNT(*) DESC,
                        a.source_domain ASC
               LIMIT ?"#,
        )
        .bind(min_articles)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let articles_count: i64 = row.get("articles_count");
                let conflicted_count: i64 = row.get::<Option<i64>, _>("conflicted_count").unwrap_or(0);
                PolarizingSource {
                    source_domain: row.get("source_domain"),
                    articles_count,
                    conflicted_count,
                    polarization_score: if articles_count > 0 {
                        conflicted_count as f64 / articles_count as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect())
    }

    // ---- pipeline state ----------------------------------------------

    /// Record the successful completion time of a scheduler tier.
    pub async fn set_worker_last_run(
        &self,
        tier: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pipeline_state (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(format!("worker_last_run.{tier}"))
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn worker_last_runs(&self) -> Result<HashMap<String, String>, StoreError> {
        let rows =
            sqlx::query("SELECT key, value FROM pipeline_state WHERE key LIKE 'worker_last_run.%'")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let key: String = row.get("key");
                let tier = key.trim_start_matches("worker_last_run.").to_string();
                (tier, row.get("value"))
            })
            .collect())
    }
}
