//! NewsAPI fetcher
//!
//! Client for the NewsAPI.org `everything` endpoint.
//! Free tier: 100 requests/day; quota is tracked client-side and an
//! exhausted quota degrades to an empty batch.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{FetchWindow, NewsSource, SourceKind};
use crate::error::FetchError;
use crate::models::article::RawArticle;

/// NewsAPI configuration
#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    pub base_url: String,
    pub api_key: String,
    /// Query expression sent to `everything`.
    pub query: String,
    pub page_size: u32,
    /// Daily request limit for quota tracking.
    pub daily_limit: u32,
    pub timeout: Duration,
}

impl NewsApiConfig {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            base_url: "https://newsapi.org".to_string(),
            api_key,
            query: "world OR breaking OR crisis".to_string(),
            page_size: 100,
            daily_limit: 100,
            timeout,
        }
    }
}

/// Quota tracking state
struct QuotaState {
    requests_today: u32,
    day_start: NaiveDate,
}

/// NewsAPI client
pub struct NewsApiClient {
    config: NewsApiConfig,
    client: Client,
    quota: RwLock<QuotaState>,
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    content: Option<String>,
}

impl NewsApiClient {
    pub fn new(config: NewsApiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            quota: RwLock::new(QuotaState {
                requests_today: 0,
                day_start: Utc::now().date_naive(),
            }),
        }
    }

    /// True when a request fits in today's quota.
    async fn try_consume_quota(&self) -> bool {
        let mut quota = self.quota.write().await;
        let today = Utc::now().date_naive();
        if quota.day_start != today {
            quota.requests_today = 0;
            quota.day_start = today;
        }
        if quota.requests_today >= self.config.daily_limit {
            return false;
        }
        quota.requests_today += 1;
        true
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    fn kind(&self) -> SourceKind {
        SourceKind::NewsApi
    }

    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        if self.config.api_key.is_empty() {
            return Err(FetchError::NotConfigured);
        }
        if !self.try_consume_quota().await {
            tracing::warn!("NewsAPI daily quota exhausted; returning empty batch");
            return Ok(Vec::new());
        }

        let url = format!("{}/v2/everything", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.config.query.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", &self.config.page_size.to_string()),
                ("from", &window.start.format("%Y-%m-%dT%H:%M:%S").to_string()),
                ("to", &window.end.format("%Y-%m-%dT%H:%M:%S").to_string()),
                ("apiKey", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        if response.status().is_server_error() {
            return Err(FetchError::SourceUnavailable(format!(
                "NewsAPI returned {}",
                response.status()
            )));
        }

        let body: NewsApiResponse = response
            .json()
            .await
            .map_err(|err| FetchError::SourceUnavailable(format!("NewsAPI payload: {err}")))?;

        if body.status != "ok" {
            return Err(FetchError::SourceUnavailable(format!(
                "NewsAPI error: {} - {}",
                body.code.unwrap_or_default(),
                body.message.unwrap_or_default()
            )));
        }

        let articles = body
            .articles
            .into_iter()
            .filter_map(|article| {
                let title = article.title?;
                let timestamp: Option<DateTime<Utc>> = article
                    .published_at
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                Some(RawArticle {
                    url: article.url,
                    title,
                    source_domain: None,
                    summary: article.description,
                    snippet: article.content,
                    timestamp,
                })
            })
            .collect();

        Ok(articles)
    }
}
