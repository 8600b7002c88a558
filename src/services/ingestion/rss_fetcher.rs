//! RSS fetcher
//!
//! Pulls a configured list of RSS/Atom feeds and flattens their entries
//! into raw articles. One broken feed never fails the batch; only all
//! feeds failing makes the source unavailable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

use super::{FetchWindow, NewsSource, SourceKind};
use crate::error::FetchError;
use crate::models::article::RawArticle;

/// RSS fetcher configuration
#[derive(Debug, Clone)]
pub struct RssFetcherConfig {
    /// Feed URLs to poll each cycle.
    pub feeds: Vec<String>,
    pub timeout: Duration,
}

impl RssFetcherConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            feeds: vec![
                "https://feeds.bbci.co.uk/news/world/rss.xml".to_string(),
                "https://www.theguardian.com/world/rss".to_string(),
                "https://www.aljazeera.com/xml/rss/all.xml".to_string(),
                "https://rss.dw.com/rdf/rss-en-world".to_string(),
                "https://feeds.npr.org/1004/rss.xml".to_string(),
            ],
            timeout,
        }
    }
}

/// Multi-feed RSS/Atom fetcher
pub struct RssFetcher {
    config: RssFetcherConfig,
    client: Client,
}

impl RssFetcher {
    pub fn new(config: RssFetcherConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    async fn fetch_feed(&self, feed_url: &str, window: &FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        let response = self.client.get(feed_url).send().await?;
        if response.status().is_server_error() {
            return Err(FetchError::SourceUnavailable(format!(
                "{feed_url} returned {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        let feed = feed_rs::parser::parse(&bytes[..])
            .map_err(|err| FetchError::SourceUnavailable(format!("{feed_url}: {err}")))?;

        let articles = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry.links.first()?.href.clone();
                let title = entry.title.map(|t| t.content)?;
                let timestamp: Option<DateTime<Utc>> = entry.published.or(entry.updated);
                let summary = entry.summary.map(|s| s.content);
                Some(RawArticle {
                    url,
                    title,
                    source_domain: None,
                    summary,
                    snippet: None,
                    timestamp,
                })
            })
            .filter(|a| a.timestamp.map(|t| window.contains(t)).unwrap_or(true))
            .collect();

        Ok(articles)
    }
}

#[async_trait]
impl NewsSource for RssFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        let mut articles = Vec::new();
        let mut failures = 0usize;

        for feed_url in &self.config.feeds {
            match self.fetch_feed(feed_url, &window).await {
                Ok(mut batch) => {
                    tracing::debug!(feed = %feed_url, count = batch.len(), "Fetched feed");
                    articles.append(&mut batch);
                }
                Err(err) => {
                    failures += 1;
                    tracing::warn!(feed = %feed_url, error = %err, "Feed fetch failed");
                }
            }
        }

        if !self.config.feeds.is_empty() && failures == self.config.feeds.len() {
            return Err(FetchError::SourceUnavailable(
                "all RSS feeds failed".to_string(),
            ));
        }

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss_body(pub_date: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>World feed</title>
    <link>https://example.com</link>
    <description>test</description>
    <item>
      <title>Flood waters rise in delta region</title>
      <link>https://example.com/flood</link>
      <description>Rivers crested overnight.</description>
      <pubDate>{pub_date}</pubDate>
    </item>
  </channel>
</rss>"#
        )
    }

    #[tokio::test]
    async fn test_fetch_parses_feed_entries() {
        let server = MockServer::start().await;
        let now = Utc::now();
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(rss_body(&now.to_rfc2822())),
            )
            .mount(&server)
            .await;

        let config = RssFetcherConfig {
            feeds: vec![format!("{}/feed.xml", server.uri())],
            timeout: Duration::from_secs(5),
        };
        let fetcher = RssFetcher::new(config);
        let window = FetchWindow::ending_at(now + chrono::Duration::minutes(1), 60);
        let articles = fetcher.fetch(window).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://example.com/flood");
        assert_eq!(
            articles[0].summary.as_deref(),
            Some("Rivers crested overnight.")
        );
    }

    #[tokio::test]
    async fn test_one_broken_feed_does_not_fail_batch() {
        let server = MockServer::start().await;
        let now = Utc::now();
        Mock::given(method("GET"))
            .and(path("/good.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(rss_body(&now.to_rfc2822())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bad.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = RssFetcherConfig {
            feeds: vec![
                format!("{}/good.xml", server.uri()),
                format!("{}/bad.xml", server.uri()),
            ],
            timeout: Duration::from_secs(5),
        };
        let fetcher = RssFetcher::new(config);
        let window = FetchWindow::ending_at(now + chrono::Duration::minutes(1), 60);
        let articles = fetcher.fetch(window).await.unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[tokio::test]
    async fn test_all_feeds_failing_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = RssFetcherConfig {
            feeds: vec![format!("{}/bad.xml", server.uri())],
            timeout: Duration::from_secs(5),
        };
        let fetcher = RssFetcher::new(config);
        let window = FetchWindow::ending_at(Utc::now(), 60);
        assert!(matches!(
            fetcher.fetch(window).await,
            Err(FetchError::SourceUnavailable(_))
        ));
    }
}
