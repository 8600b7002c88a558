//! Ingestion
//!
//! One fetcher per source family, all implementing the same contract:
//! pull recent items for a time window, normalize nothing, touch the
//! store never. A failing source yields an empty batch or a
//! `SourceUnavailable`, and must not affect its siblings.

pub mod gdelt;
pub mod mediastack_client;
pub mod newsapi_client;
pub mod official_feeds;
pub mod reddit_monitor;
pub mod rss_fetcher;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::models::article::RawArticle;

pub use gdelt::{GdeltConfig, GdeltFetcher};
pub use mediastack_client::{MediastackClient, MediastackConfig};
pub use newsapi_client::{NewsApiClient, NewsApiConfig};
pub use official_feeds::{OfficialFeedsConfig, OfficialFeedsFetcher};
pub use reddit_monitor::{RedditConfig, RedditMonitor};
pub use rss_fetcher::{RssFetcher, RssFetcherConfig};

/// Source families the pipeline ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Gdelt,
    Rss,
    Reddit,
    NewsApi,
    Mediastack,
    NgoGov,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Gdelt => "gdelt",
            SourceKind::Rss => "rss",
            SourceKind::Reddit => "reddit",
            SourceKind::NewsApi => "newsapi",
            SourceKind::Mediastack => "mediastack",
            SourceKind::NgoGov => "ngo_gov",
        }
    }

    /// Default fetch window per family.
    pub fn default_window_minutes(&self) -> i64 {
        match self {
            SourceKind::Gdelt | SourceKind::Reddit => 15,
            SourceKind::Rss | SourceKind::NewsApi | SourceKind::Mediastack | SourceKind::NgoGov => {
                60
            }
        }
    }
}

/// Half-open fetch window `(start, end]`.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn ending_at(end: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start: end - Duration::minutes(minutes),
            end,
        }
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(1)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.start && timestamp <= self.end
    }
}

/// The single fetcher capability.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch items for the window. Recoverable trouble yields an empty
    /// batch; only a fully unavailable source returns an error.
    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError>;
}

/// Build the enabled source set for this process. Sources whose API key
/// is missing are skipped with a log line.
pub fn build_sources(config: &AppConfig) -> Vec<Arc<dyn NewsSource>> {
    let timeout = config.scheduler.fetch_timeout;
    let mut sources: Vec<Arc<dyn NewsSource>> = vec![
        Arc::new(GdeltFetcher::new(GdeltConfig::new(timeout))),
        Arc::new(RssFetcher::new(RssFetcherConfig::new(timeout))),
        Arc::new(RedditMonitor::new(RedditConfig::new(timeout))),
        Arc::new(OfficialFeedsFetcher::new(OfficialFeedsConfig::new(timeout))),
    ];

    match &config.sources.newsapi_key {
        Some(key) => {
            sources.push(Arc::new(NewsApiClient::new(NewsApiConfig::new(
                key.clone(),
                timeout,
            ))));
            tracing::info!(source = "newsapi", "Source enabled");
        }
        None => tracing::warn!(source = "newsapi", "Source disabled: NEWSAPI_KEY not set"),
    }

    match &config.sources.mediastack_key {
        Some(key) => {
            sources.push(Arc::new(MediastackClient::new(MediastackConfig::new(
                key.clone(),
                timeout,
            ))));
            tracing::info!(source = "mediastack", "Source enabled");
        }
        None => tracing::warn!(
            source = "mediastack",
            "Source disabled: MEDIASTACK_KEY not set"
        ),
    }

    tracing::info!(count = sources.len(), "Source registry ready");
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        let end = Utc::now();
        let window = FetchWindow::ending_at(end, 15);
        assert_eq!(window.minutes(), 15);
        assert!(window.contains(end));
        assert!(window.contains(end - Duration::minutes(14)));
        assert!(!window.contains(end - Duration::minutes(15)));
        assert!(!window.contains(end + Duration::minutes(1)));
    }

    #[test]
    fn test_default_windows() {
        assert_eq!(SourceKind::Gdelt.default_window_minutes(), 15);
        assert_eq!(SourceKind::Reddit.default_window_minutes(), 15);
        assert_eq!(SourceKind::Rss.default_window_minutes(), 60);
        assert_eq!(SourceKind::NewsApi.default_window_minutes(), 60);
    }
}
