//! Scheduler tier behavior: fetcher independence, normalization into the
//! store, and the deep-analysis fact-check path.

mod common;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

use common::{memory_store, new_article};
use news_verification_backend::config::SchedulerConfig;
use news_verification_backend::models::article::{FactCheckFlag, FactCheckStatus, RawArticle};
use news_verification_backend::services::fact_check::{FactCheckOutcome, FactChecker};
use news_verification_backend::services::ingestion::{FetchWindow, NewsSource, SourceKind};
use news_verification_backend::services::processing::normalizer::NormalizerConfig;
use news_verification_backend::services::processing::HashedProjectionEmbedder;
use news_verification_backend::{
    ClusterParams, Clusterer, DisabledFactChecker, EventStore, FetchError, Normalizer,
    PipelineScheduler, Scorer,
};

struct MockSource {
    kind: SourceKind,
    articles: Vec<RawArticle>,
    fail: bool,
}

#[async_trait]
impl NewsSource for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        if self.fail {
            Err(FetchError::SourceUnavailable("mock outage".to_string()))
        } else {
            Ok(self.articles.clone())
        }
    }
}

fn scheduler_with_sources(
    store: &Arc<EventStore>,
    sources: Vec<Arc<dyn NewsSource>>,
    fact_checker: Arc<dyn FactChecker>,
) -> PipelineScheduler {
    let scorer = Arc::new(Scorer::default());
    PipelineScheduler::new(
        store.clone(),
        sources,
        Arc::new(Normalizer::new(store.clone(), NormalizerConfig::default())),
        Arc::new(Clusterer::new(
            store.clone(),
            Arc::new(HashedProjectionEmbedder),
            scorer.clone(),
            ClusterParams::default(),
        )),
        scorer,
        fact_checker,
        SchedulerConfig::default(),
    )
}

fn raw(url: &str, title: &str) -> RawArticle {
    RawArticle {
        url: url.to_string(),
        title: title.to_string(),
        source_domain: None,
        summary: None,
        snippet: None,
        timestamp: Some(Utc::now() - Duration::minutes(5)),
    }
}

/// One failing source never prevents the others from landing articles.
#[tokio::test]
async fn test_failing_source_does_not_block_siblings() {
    let store = memory_store().await;
    let sources: Vec<Arc<dyn NewsSource>> = vec![
        Arc::new(MockSource {
            kind: SourceKind::Rss,
            articles: vec![
                raw("https://example.com/a", "Severe flooding closes mountain highway"),
                raw("https://example.org/b", "Severe flooding strands village residents"),
            ],
            fail: false,
        }),
        Arc::new(MockSource {
            kind: SourceKind::Reddit,
            articles: vec![],
            fail: true,
        }),
    ];

    let scheduler = scheduler_with_sources(&store, sources, Arc::new(DisabledFactChecker));
    scheduler.run_tier("tier2", Utc::now()).await;

    let articles = store
        .articles_ingested_since(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(articles.len(), 2);

    let stats = scheduler.stats().await;
    assert_eq!(stats.articles_inserted, 2);
    assert_eq!(stats.errors, 1);

    // The tier still completed, so its heartbeat advanced.
    let workers = store.worker_last_runs().await.unwrap();
    assert!(workers.contains_key("tier2"));
}

/// Tier 1 only consults the GDELT source.
#[tokio::test]
async fn test_tier1_fetches_gdelt_only() {
    let store = memory_store().await;
    let sources: Vec<Arc<dyn NewsSource>> = vec![
        Arc::new(MockSource {
            kind: SourceKind::Gdelt,
            articles: vec![raw("https://fastwire.com/1", "Breaking story lands on the fast tier")],
            fail: false,
        }),
        Arc::new(MockSource {
            kind: SourceKind::Rss,
            articles: vec![raw("https://slowfeed.com/1", "Standard tier story should wait")],
            fail: false,
        }),
    ];

    let scheduler = scheduler_with_sources(&store, sources, Arc::new(DisabledFactChecker));
    scheduler.run_tier1(Utc::now()).await.unwrap();

    let articles = store
        .articles_ingested_since(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].source_domain, "fastwire.com");
}

struct FlaggingChecker;

#[async_trait]
impl FactChecker for FlaggingChecker {
    async fn check(
        &self,
        article: &news_verification_backend::models::article::Article,
    ) -> anyhow::Result<FactCheckOutcome> {
        Ok(FactCheckOutcome {
            status: FactCheckStatus::Disputed,
            flags: vec![FactCheckFlag {
                claim: article.title.clone(),
                verdict: "disputed".to_string(),
                evidence_url: None,
                confidence: 0.7,
            }],
        })
    }
}

/// Tier 4 checks unchecked articles on important events and records the
/// verdicts.
#[tokio::test]
async fn test_tier4_fact_checks_and_flags() {
    let store = memory_store().await;
    let now = Utc::now();

    let article = new_article(
        "https://claims.com/story",
        "claims.com",
        "Disputed claim circulates widely online",
        now,
    );
    let article_id = store.insert_article(&article, now).await.unwrap();
    let event_id = store
        .create_or_get_event("Disputed claim circulates", article_id)
        .await
        .unwrap();
    store.commit_event_update(event_id, &[], None).await.unwrap();

    let scheduler = scheduler_with_sources(&store, Vec::new(), Arc::new(FlaggingChecker));
    scheduler.run_tier4(now).await.unwrap();

    let checked = store.get_article(article_id).await.unwrap();
    assert_eq!(checked.fact_check_status, FactCheckStatus::Disputed);
    assert_eq!(checked.fact_check_flags.len(), 1);

    let (total, flagged) = store
        .flagged_articles(&["disputed"], None, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(flagged[0].id, article_id);
}

/// A disabled fact checker makes Tier 4 a no-op.
#[tokio::test]
async fn test_tier4_disabled_is_noop() {
    let store = memory_store().await;
    let now = Utc::now();
    let article = new_article(
        "https://claims.com/story",
        "claims.com",
        "Unchecked claim stays unchecked",
        now,
    );
    let article_id = store.insert_article(&article, now).await.unwrap();
    let event_id = store
        .create_or_get_event("Unchecked claim", article_id)
        .await
        .unwrap();
    store.commit_event_update(event_id, &[], None).await.unwrap();

    let scheduler = scheduler_with_sources(&store, Vec::new(), Arc::new(DisabledFactChecker));
    scheduler.run_tier4(now).await.unwrap();

    let article = store.get_article(article_id).await.unwrap();
    assert_eq!(article.fact_check_status, FactCheckStatus::Unchecked);
}
