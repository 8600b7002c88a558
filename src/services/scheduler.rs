//! Pipeline scheduler
//!
//! Five cooperative tiers on independent cadences: fast fetch, standard
//! fetch, analysis, deep analysis, cleanup. At most one instance of each
//! tier runs at a time; a tier still running when its next tick arrives
//! skips that tick. Tier failures are logged, never propagated.

use chrono::{DateTime, Duration as ChronoDuration, Local, Timelike, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::config::SchedulerConfig;
use crate::error::FetchError;
use crate::models::article::RawArticle;
use crate::services::fact_check::FactChecker;
use crate::services::ingestion::{FetchWindow, NewsSource, SourceKind};
use crate::services::processing::clustering::Clusterer;
use crate::services::processing::normalizer::Normalizer;
use crate::services::scoring::Scorer;
use crate::services::store::EventStore;

/// Counters accumulated across pipeline runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub articles_fetched: HashMap<String, usize>,
    pub articles_inserted: usize,
    pub skipped_duplicates: usize,
    pub skipped_language: usize,
    pub skipped_similar: usize,
    pub clusters_formed: usize,
    pub events_created: usize,
    pub events_rescored: usize,
    pub articles_fact_checked: usize,
    pub articles_expired: u64,
    pub errors: usize,
    pub last_run: Option<DateTime<Utc>>,
    pub last_run_duration_secs: Option<f64>,
}

/// The five-tier pipeline driver.
pub struct PipelineScheduler {
    store: Arc<EventStore>,
    sources: Vec<Arc<dyn NewsSource>>,
    normalizer: Arc<Normalizer>,
    clusterer: Arc<Clusterer>,
    scorer: Arc<Scorer>,
    fact_checker: Arc<dyn FactChecker>,
    config: SchedulerConfig,
    stats: Arc<RwLock<PipelineStats>>,
    tier_locks: HashMap<&'static str, Arc<Mutex<()>>>,
}

/// Handle stopping the spawned tier loops.
pub struct SchedulerHandle {
    stop_flag: Arc<RwLock<bool>>,
}

impl SchedulerHandle {
    pub async fn stop(&self) {
        let mut flag = self.stop_flag.write().await;
        *flag = true;
    }
}

impl PipelineScheduler {
    pub fn new(
        store: Arc<EventStore>,
        sources: Vec<Arc<dyn NewsSource>>,
        normalizer: Arc<Normalizer>,
        clusterer: Arc<Clusterer>,
        scorer: Arc<Scorer>,
        fact_checker: Arc<dyn FactChecker>,
        config: SchedulerConfig,
    ) -> Self {
        let tier_locks = ["tier1", "tier2", "tier3", "tier4", "tier5"]
            .into_iter()
            .map(|tier| (tier, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            store,
            sources,
            normalizer,
            clusterer,
            scorer,
            fact_checker,
            config,
            stats: Arc::new(RwLock::new(PipelineStats::default())),
            tier_locks,
        }
    }

    pub async fn stats(&self) -> PipelineStats {
        self.stats.read().await.clone()
    }

    /// Peak window: 06:00-23:00 local time.
    fn is_peak() -> bool {
        let hour = Local::now().hour();
        (6..23).contains(&hour)
    }

    /// Spawn all tier loops. The returned handle stops them between ticks.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let handle = SchedulerHandle {
            stop_flag: Arc::new(RwLock::new(false)),
        };

        self.clone().spawn_interval_tier(
            "tier1",
            handle.stop_flag.clone(),
            |scheduler| {
                if Self::is_peak() {
                    scheduler.config.tier1_interval_peak
                } else {
                    scheduler.config.tier1_interval_offpeak
                }
            },
        );

        self.clone().spawn_interval_tier(
            "tier2",
            handle.stop_flag.clone(),
            |scheduler| {
                if Self::is_peak() {
                    scheduler.config.tier2_interval_peak
                } else {
                    scheduler.config.tier2_interval_offpeak
                }
            },
        );

        self.clone().spawn_interval_tier(
            "tier3",
            handle.stop_flag.clone(),
            |scheduler| scheduler.config.tier3_interval,
        );

        self.clone().spawn_interval_tier(
            "tier4",
            handle.stop_flag.clone(),
            |scheduler| scheduler.config.tier4_interval,
        );

        // Tier 5 runs daily at 03:00 local.
        {
            let scheduler = self;
            let stop_flag = handle.stop_flag.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(until_next_3am()).await;
                    if *stop_flag.read().await {
                        break;
                    }
                    scheduler.run_tier("tier5", Utc::now()).await;
                }
            });
        }

        handle
    }

    fn spawn_interval_tier(
        self: Arc<Self>,
        tier: &'static str,
        stop_flag: Arc<RwLock<bool>>,
        interval_of: fn(&PipelineScheduler) -> Duration,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval_of(&self)).await;
                if *stop_flag.read().await {
                    break;
                }
                self.run_tier(tier, Utc::now()).await;
            }
        });
    }

    /// Run one tier under its mutex; a held lock means the previous run
    /// is still going, so this tick is skipped rather than queued.
    pub async fn run_tier(&self, tier: &str, now: DateTime<Utc>) {
        let Some(lock) = self.tier_locks.get(tier) else {
            return;
        };
        let Ok(_guard) = lock.try_lock() else {
            tracing::warn!(tier, "Previous run still in progress; skipping tick");
            return;
        };

        let started = std::time::Instant::now();
        let result = match tier {
            "tier1" => self.run_tier1(now).await,
            "tier2" => self.run_tier2(now).await,
            "tier3" => self.run_tier3(now).await,
            "tier4" => self.run_tier4(now).await,
            "tier5" => self.run_tier5(now).await,
            _ => Ok(()),
        };

        match result {
            Ok(()) => {
                if let Err(err) = self.store.set_worker_last_run(tier, Utc::now()).await {
                    tracing::error!(tier, error = %err, "Failed to record worker_last_run");
                }
                let mut stats = self.stats.write().await;
                stats.last_run = Some(Utc::now());
                stats.last_run_duration_secs = Some(started.elapsed().as_secs_f64());
            }
            Err(err) => {
                tracing::error!(tier, error = %err, "Tier run failed");
                self.stats.write().await.errors += 1;
            }
        }
    }

    /// T1: GDELT only, normalize, insert.
    pub async fn run_tier1(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let gdelt: Vec<Arc<dyn NewsSource>> = self
            .sources
            .iter()
            .filter(|source| source.kind() == SourceKind::Gdelt)
            .cloned()
            .collect();
        let batch = self.fetch_parallel(&gdelt, now).await;
        self.normalize_and_record(batch, now).await;
        Ok(())
    }

    /// T2: every other source in parallel, normalize, incremental cluster
    /// over the last 6 hours (scores committed with memberships).
    pub async fn run_tier2(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let others: Vec<Arc<dyn NewsSource>> = self
            .sources
            .iter()
            .filter(|source| source.kind() != SourceKind::Gdelt)
            .cloned()
            .collect();
        let batch = self.fetch_parallel(&others, now).await;
        self.normalize_and_record(batch, now).await;

        let outcome = self.clusterer.cluster_window(6, 6, now).await;
        let mut stats = self.stats.write().await;
        stats.clusters_formed += outcome.clusters_formed;
        stats.events_created += outcome.events_created;
        stats.events_rescored += outcome.touched_events.len();
        Ok(())
    }

    /// T3: re-cluster the 6-hour window, then fully re-evaluate recently
    /// updated events (capped), with excerpt extraction for the first few.
    pub async fn run_tier3(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let outcome = self.clusterer.cluster_window(6, 6, now).await;
        {
            let mut stats = self.stats.write().await;
            stats.clusters_formed += outcome.clusters_formed;
            stats.events_created += outcome.events_created;
        }

        let candidates = self
            .store
            .events_updated_since(
                now - ChronoDuration::hours(6),
                self.config.max_reanalyzed_per_run as i64,
            )
            .await?;

        let mut rescored = 0usize;
        for (index, event) in candidates.iter().enumerate() {
            let members = self.store.articles_for_event(event.id).await?;
            if members.is_empty() {
                continue;
            }
            let include_excerpts = index < self.config.max_excerpts_per_run;
            let update = self.scorer.score_event(&members, now, include_excerpts);
            match self
                .store
                .commit_event_update(event.id, &[], Some(&update))
                .await
            {
                Ok(_) => rescored += 1,
                Err(err) => {
                    tracing::error!(event_id = event.id, error = %err, "Re-analysis commit failed");
                }
            }
        }

        self.stats.write().await.events_rescored += rescored;
        tracing::info!(rescored, "Analysis tier complete");
        Ok(())
    }

    /// T4: fact-check a batch of unchecked articles on important events,
    /// then recompute the affected events.
    pub async fn run_tier4(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        if !self.fact_checker.is_enabled() {
            tracing::debug!("Fact checker disabled; skipping deep analysis tier");
            return Ok(());
        }

        let batch = self
            .store
            .unchecked_articles_by_importance(self.config.fact_check_batch_size as i64)
            .await?;
        if batch.is_empty() {
            return Ok(());
        }

        let outcomes: Vec<(i64, Option<i64>, _)> = futures::stream::iter(batch.into_iter().map(
            |article| {
                let checker = self.fact_checker.clone();
                async move {
                    let outcome = checker.check(&article).await;
                    (article.id, article.cluster_id, outcome)
                }
            },
        ))
        .buffer_unordered(self.config.max_fact_check_workers.max(1))
        .collect()
        .await;

        let mut checked = 0usize;
        let mut touched_events: Vec<i64> = Vec::new();
        for (article_id, cluster_id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    self.store
                        .set_fact_check(article_id, result.status.as_str(), &result.flags)
                        .await?;
                    checked += 1;
                    if let Some(event_id) = cluster_id {
                        if !touched_events.contains(&event_id) {
                            touched_events.push(event_id);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(article_id, error = %err, "Fact check failed");
                }
            }
        }

        for event_id in touched_events {
            let members = self.store.articles_for_event(event_id).await?;
            if members.is_empty() {
                continue;
            }
            let update = self.scorer.score_event(&members, now, false);
            if let Err(err) = self
                .store
                .commit_event_update(event_id, &[], Some(&update))
                .await
            {
                tracing::error!(event_id, error = %err, "Post-fact-check rescore failed");
            }
        }

        self.stats.write().await.articles_fact_checked += checked;
        tracing::info!(checked, "Deep analysis tier complete");
        Ok(())
    }

    /// T5: retention sweep. Expired events keep their counts frozen.
    pub async fn run_tier5(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let cutoff = now - ChronoDuration::days(self.config.article_retention_days);
        let outcome = self.store.expire_articles(cutoff).await?;
        self.stats.write().await.articles_expired += outcome.articles_removed;
        tracing::info!(
            removed = outcome.articles_removed,
            frozen = outcome.events_frozen,
            "Cleanup tier complete"
        );
        Ok(())
    }

    /// Fetch the given sources concurrently with a bounded worker pool and
    /// per-source timeout. Failing sources contribute nothing; siblings
    /// are unaffected.
    async fn fetch_parallel(
        &self,
        sources: &[Arc<dyn NewsSource>],
        now: DateTime<Utc>,
    ) -> Vec<RawArticle> {
        let timeout = self.config.fetch_timeout;
        let mut futs: Vec<
            std::pin::Pin<
                Box<dyn std::future::Future<Output = (SourceKind, Result<Vec<RawArticle>, FetchError>)> + Send>,
            >,
        > = Vec::with_capacity(sources.len());
        for source in sources.iter().cloned() {
            futs.push(Box::pin(async move {
                let kind = source.kind();
                let window = FetchWindow::ending_at(now, kind.default_window_minutes());
                let outcome = match tokio::time::timeout(timeout, source.fetch(window)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
                };
                (kind, outcome)
            }));
        }
        let results: Vec<(SourceKind, Result<Vec<RawArticle>, FetchError>)> =
            futures::stream::iter(futs)
                .buffer_unordered(self.config.fetch_workers.max(1))
                .collect()
                .await;

        let mut batch = Vec::new();
        let mut stats = self.stats.write().await;
        for (kind, outcome) in results {
            match outcome {
                Ok(articles) => {
                    tracing::info!(source = kind.as_str(), count = articles.len(), "Fetched");
                    *stats
                        .articles_fetched
                        .entry(kind.as_str().to_string())
                        .or_default() += articles.len();
                    batch.extend(articles);
                }
                Err(err) => {
                    tracing::warn!(source = kind.as_str(), error = %err, "Fetch failed");
                    stats.errors += 1;
                }
            }
        }
        batch
    }

    async fn normalize_and_record(&self, batch: Vec<RawArticle>, now: DateTime<Utc>) {
        if batch.is_empty() {
            return;
        }
        let outcome = self.normalizer.normalize_batch(batch, now).await;
        let mut stats = self.stats.write().await;
        stats.articles_inserted += outcome.inserted.len();
        stats.skipped_duplicates += outcome.skipped_duplicate;
        stats.skipped_language += outcome.skipped_language;
        stats.skipped_similar += outcome.skipped_similar;
        stats.errors += outcome.errors;
    }
}

/// Time until the next 03:00 local.
fn until_next_3am() -> Duration {
    let now = Local::now();
    let today_3am = now
        .date_naive()
        .and_hms_opt(3, 0, 0)
        .expect("03:00 is a valid time");
    let next = if now.naive_local() < today_3am {
        today_3am
    } else {
        today_3am + ChronoDuration::days(1)
    };
    let wait = next - now.naive_local();
    Duration::from_secs(wait.num_seconds().max(60) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_next_3am_is_within_a_day() {
        let wait = until_next_3am();
        assert!(wait >= Duration::from_secs(60));
        assert!(wait <= Duration::from_secs(24 * 3600));
    }
}
