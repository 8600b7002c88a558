//! Mediastack fetcher
//!
//! Client for the mediastack live-news endpoint. Key-gated; the source
//! is simply absent from the registry when no key is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{FetchWindow, NewsSource, SourceKind};
use crate::error::FetchError;
use crate::models::article::RawArticle;

/// Mediastack configuration
#[derive(Debug, Clone)]
pub struct MediastackConfig {
    pub base_url: String,
    pub access_key: String,
    pub limit: u32,
    pub timeout: Duration,
}

impl MediastackConfig {
    pub fn new(access_key: String, timeout: Duration) -> Self {
        Self {
            base_url: "http://api.mediastack.com".to_string(),
            access_key,
            limit: 100,
            timeout,
        }
    }
}

/// Mediastack client
pub struct MediastackClient {
    config: MediastackConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MediastackResponse {
    #[serde(default)]
    data: Vec<MediastackArticle>,
    error: Option<MediastackError>,
}

#[derive(Debug, Deserialize)]
struct MediastackError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediastackArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

impl MediastackClient {
    pub fn new(config: MediastackConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl NewsSource for MediastackClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Mediastack
    }

    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        if self.config.access_key.is_empty() {
            return Err(FetchError::NotConfigured);
        }

        let url = format!("{}/v1/news", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_key", self.config.access_key.as_str()),
                ("languages", "en"),
                ("sort", "published_desc"),
                ("limit", &self.config.limit.to_string()),
            ])
            .send()
            .await?;

        if response.status().is_server_error() {
            return Err(FetchError::SourceUnavailable(format!(
                "mediastack returned {}",
                response.status()
            )));
        }

        let body: MediastackResponse = response
            .json()
            .await
            .map_err(|err| FetchError::SourceUnavailable(format!("mediastack payload: {err}")))?;

        if let Some(error) = body.error {
            return Err(FetchError::SourceUnavailable(format!(
                "mediastack error: {} - {}",
                error.code.unwrap_or_default(),
                error.message.unwrap_or_default()
            )));
        }

        let articles = body
            .data
            .into_iter()
            .filter_map(|article| {
                let url = article.url?;
                let title = article.title?;
                let timestamp: Option<DateTime<Utc>> = article
                    .published_at
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                Some(RawArticle {
                    url,
                    title,
                    source_domain: None,
                    summary: article.description,
                    snippet: None,
                    timestamp,
                })
            })
            .filter(|a| a.timestamp.map(|t| window.contains(t)).unwrap_or(true))
            .collect();

        Ok(articles)
    }
}
