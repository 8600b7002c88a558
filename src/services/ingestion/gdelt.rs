//! GDELT fetcher
//!
//! Pulls recent worldwide coverage from the GDELT DOC 2.0 article-list
//! API. No key required; the timespan parameter maps directly onto the
//! fetch window.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{FetchWindow, NewsSource, SourceKind};
use crate::error::FetchError;
use crate::models::article::RawArticle;

/// GDELT fetcher configuration
#[derive(Debug, Clone)]
pub struct GdeltConfig {
    pub base_url: String,
    /// DOC API query expression.
    pub query: String,
    pub max_records: u32,
    pub timeout: Duration,
}

impl GdeltConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            base_url: "https://api.gdeltproject.org".to_string(),
            query: "sourcelang:english".to_string(),
            max_records: 75,
            timeout,
        }
    }
}

/// GDELT DOC API client
pub struct GdeltFetcher {
    config: GdeltConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GdeltResponse {
    #[serde(default)]
    articles: Vec<GdeltArticle>,
}

#[derive(Debug, Deserialize)]
struct GdeltArticle {
    url: String,
    title: String,
    #[serde(default)]
    seendate: String,
    #[serde(default)]
    domain: String,
}

impl GdeltFetcher {
    pub fn new(config: GdeltConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    /// GDELT's seendate format: `20240131T235900Z`.
    fn parse_seendate(raw: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[async_trait]
impl NewsSource for GdeltFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Gdelt
    }

    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        let url = format!("{}/api/v2/doc/doc", self.config.base_url);
        let timespan = format!("{}min", window.minutes());

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", self.config.query.as_str()),
                ("mode", "ArtList"),
                ("format", "json"),
                ("timespan", timespan.as_str()),
                ("maxrecords", &self.config.max_records.to_string()),
            ])
            .send()
            .await?;

        if response.status().is_server_error() {
            return Err(FetchError::SourceUnavailable(format!(
                "GDELT returned {}",
                response.status()
            )));
        }

        let body: GdeltResponse = response
            .json()
            .await
            .map_err(|err| FetchError::SourceUnavailable(format!("GDELT payload: {err}")))?;

        let articles = body
            .articles
            .into_iter()
            .filter(|a| !a.url.is_empty() && !a.title.is_empty())
            .map(|a| {
                let timestamp = Self::parse_seendate(&a.seendate);
                RawArticle {
                    url: a.url,
                    title: a.title,
                    source_domain: if a.domain.is_empty() {
                        None
                    } else {
                        Some(a.domain)
                    },
                    summary: None,
                    snippet: None,
                    timestamp,
                }
            })
            .filter(|a| a.timestamp.map(|t| window.contains(t)).unwrap_or(true))
            .collect();

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> GdeltConfig {
        GdeltConfig {
            base_url,
            ..GdeltConfig::new(Duration::from_secs(5))
        }
    }

    #[test]
    fn test_parse_seendate() {
        let parsed = GdeltFetcher::parse_seendate("20240131T235900Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-31T23:59:00+00:00");
        assert!(GdeltFetcher::parse_seendate("garbage").is_none());
    }

    #[tokio::test]
    async fn test_fetch_parses_article_list() {
        let server = MockServer::start().await;
        let now = Utc::now();
        let seendate = now.format("%Y%m%dT%H%M%SZ").to_string();

        Mock::given(method("GET"))
            .and(path("/api/v2/doc/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [
                    {
                        "url": "https://example.com/story",
                        "title": "Example story",
                        "seendate": seendate,
                        "domain": "example.com"
                    },
                    { "url": "", "title": "dropped", "seendate": "", "domain": "" }
                ]
            })))
            .mount(&server)
            .await;

        let fetcher = GdeltFetcher::new(test_config(server.uri()));
        let window = FetchWindow::ending_at(now + chrono::Duration::minutes(1), 15);
        let articles = fetcher.fetch(window).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://example.com/story");
        assert_eq!(articles[0].source_domain.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_server_error_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/doc/doc"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = GdeltFetcher::new(test_config(server.uri()));
        let window = FetchWindow::ending_at(Utc::now(), 15);
        let err = fetcher.fetch(window).await.unwrap_err();
        assert!(matches!(err, FetchError::SourceUnavailable(_)));
    }
}
