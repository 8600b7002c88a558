//! NGO / government feeds
//!
//! Official sources carry the primary-evidence weight in scoring: USGS
//! earthquake GeoJSON plus a set of humanitarian RSS feeds (WHO,
//! ReliefWeb). No keys required.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{FetchWindow, NewsSource, SourceKind};
use crate::error::FetchError;
use crate::models::article::RawArticle;

/// Official feeds configuration
#[derive(Debug, Clone)]
pub struct OfficialFeedsConfig {
    /// USGS earthquake feed base.
    pub usgs_base_url: String,
    /// Humanitarian/WHO RSS feeds.
    pub rss_feeds: Vec<String>,
    /// Minimum magnitude for a quake to become an article.
    pub min_magnitude: f64,
    pub timeout: Duration,
}

impl OfficialFeedsConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            usgs_base_url: "https://earthquake.usgs.gov".to_string(),
            rss_feeds: vec![
                "https://www.who.int/rss-feeds/news-english.xml".to_string(),
                "https://reliefweb.int/updates/rss.xml".to_string(),
            ],
            min_magnitude: 4.5,
            timeout,
        }
    }
}

/// USGS + humanitarian RSS fetcher
pub struct OfficialFeedsFetcher {
    config: OfficialFeedsConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct UsgsFeed {
    #[serde(default)]
    features: Vec<UsgsFeature>,
}

#[derive(Debug, Deserialize)]
struct UsgsFeature {
    properties: UsgsProperties,
}

#[derive(Debug, Deserialize)]
struct UsgsProperties {
    mag: Option<f64>,
    place: Option<String>,
    /// Milliseconds since the epoch.
    time: Option<i64>,
    url: Option<String>,
    title: Option<String>,
}

impl OfficialFeedsFetcher {
    pub fn new(config: OfficialFeedsConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    async fn fetch_usgs(&self, window: &FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        let url = format!(
            "{}/earthquakes/feed/v1.0/summary/all_hour.geojson",
            self.config.usgs_base_url
        );
        let response = self.client.get(&url).send().await?;
        if response.status().is_server_error() {
            return Err(FetchError::SourceUnavailable(format!(
                "USGS returned {}",
                response.status()
            )));
        }

        let feed: UsgsFeed = response
            .json()
            .await
            .map_err(|err| FetchError::SourceUnavailable(format!("USGS payload: {err}")))?;

        let articles = feed
            .features
            .into_iter()
            .filter_map(|feature| {
                let properties = feature.properties;
                let magnitude = properties.mag?;
                if magnitude < self.config.min_magnitude {
                    return None;
                }
                let url = properties.url?;
                let title = properties
                    .title
                    .or_else(|| properties.place.clone().map(|p| format!("M{magnitude:.1} - {p}")))?;
                let timestamp = properties
                    .time
                    .and_then(DateTime::from_timestamp_millis)?;
                if !window.contains(timestamp) {
                    return None;
                }
                Some(RawArticle {
                    url,
                    title,
                    source_domain: Some("usgs.gov".to_string()),
                    summary: properties.place,
                    snippet: None,
                    timestamp: Some(timestamp),
                })
            })
            .collect();

        Ok(articles)
    }

    async fn fetch_rss_feed(
        &self,
        feed_url: &str,
        window: &FetchWindow,
    ) -> Result<Vec<RawArticle>, FetchError> {
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

        Ok(feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry.links.first()?.href.clone();
                let title = entry.title.map(|t| t.content)?;
                let timestamp: Option<DateTime<Utc>> = entry.published.or(entry.updated);
                Some(RawArticle {
                    url,
                    title,
                    source_domain: None,
                    summary: entry.summary.map(|s| s.content),
                    snippet: None,
                    timestamp,
                })
            })
            .filter(|a| a.timestamp.map(|t| window.contains(t)).unwrap_or(true))
            .collect())
    }
}

#[async_trait]
impl NewsSource for OfficialFeedsFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::NgoGov
    }

    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        let mut articles = Vec::new();
        let mut failures = 0usize;
        let attempts = 1 + self.config.rss_feeds.len();

        match self.fetch_usgs(&window).await {
            Ok(mut batch) => articles.append(&mut batch),
            Err(err) => {
                failures += 1;
                tracing::warn!(error = %err, "USGS fetch failed");
            }
        }

        for feed_url in &self.config.rss_feeds {
            match self.fetch_rss_feed(feed_url, &window).await {
                Ok(mut batch) => articles.append(&mut batch),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(feed = %feed_url, error = %err, "Official feed fetch failed");
                }
            }
        }

        if failures == attempts {
            return Err(FetchError::SourceUnavailable(
                "all official feeds failed".to_string(),
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

    #[tokio::test]
    async fn test_usgs_filters_magnitude_and_window() {
        let server = MockServer::start().await;
        let now = Utc::now();

        Mock::given(method("GET"))
            .and(path("/earthquakes/feed/v1.0/summary/all_hour.geojson"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "features": [
                    { "properties": {
                        "mag": 6.1,
                        "place": "120km SSE of Honshu, Japan",
                        "time": now.timestamp_millis(),
                        "url": "https://earthquake.usgs.gov/earthquakes/eventpage/abc",
                        "title": "M 6.1 - 120km SSE of Honshu, Japan"
                    }},
                    { "properties": {
                        "mag": 2.0,
                        "place": "minor tremor",
                        "time": now.timestamp_millis(),
                        "url": "https://earthquake.usgs.gov/earthquakes/eventpage/tiny",
                        "title": "M 2.0 - minor"
                    }}
                ]
            })))
            .mount(&server)
            .await;

        let fetcher = OfficialFeedsFetcher::new(OfficialFeedsConfig {
            usgs_base_url: server.uri(),
            rss_feeds: vec![],
            ..OfficialFeedsConfig::new(Duration::from_secs(5))
        });
        let window = FetchWindow::ending_at(now + chrono::Duration::minutes(1), 60);
        let articles = fetcher.fetch(window).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source_domain.as_deref(), Some("usgs.gov"));
        assert!(articles[0].title.starts_with("M 6.1"));
    }
}
