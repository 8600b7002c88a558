//! Reddit fetcher
//!
//! Reads news subreddits through Reddit's public JSON listings (no auth
//! needed for read-only access). Rate limit: 60 requests/minute,
//! enforced client-side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{FetchWindow, NewsSource, SourceKind};
use crate::error::FetchError;
use crate::models::article::RawArticle;

/// Reddit fetcher configuration
#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub base_url: String,
    /// User agent (required by Reddit).
    pub user_agent: String,
    /// Subreddits polled each cycle.
    pub subreddits: Vec<String>,
    /// Maximum posts per subreddit listing.
    pub max_posts: u32,
    /// Minimum score for a post to count as news-worthy.
    pub min_score: i64,
    pub timeout: Duration,
}

impl RedditConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            user_agent: "news-verification-backend/0.1 (event aggregation)".to_string(),
            subreddits: vec![
                "worldnews".to_string(),
                "news".to_string(),
                "globalnews".to_string(),
            ],
            max_posts: 50,
            min_score: 10,
            timeout,
        }
    }
}

/// Rate limiter state (60 requests per rolling minute)
struct RateLimiterState {
    requests_in_window: u32,
    window_start: Instant,
}

/// Reddit JSON listing fetcher
pub struct RedditMonitor {
    config: RedditConfig,
    client: Client,
    rate_limiter: RwLock<RateLimiterState>,
}

#[derive(Debug, Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    title: String,
    #[serde(default)]
    selftext: String,
    permalink: String,
    url: String,
    created_utc: f64,
    score: i64,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    over_18: bool,
}

impl RedditMonitor {
    pub fn new(config: RedditConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            rate_limiter: RwLock::new(RateLimiterState {
                requests_in_window: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// True when another request fits inside the current minute window.
    async fn try_acquire_request(&self) -> bool {
        let mut state = self.rate_limiter.write().await;
        if state.window_start.elapsed().as_secs() >= 60 {
            state.requests_in_window = 0;
            state.window_start = Instant::now();
        }
        if state.requests_in_window >= 60 {
            return false;
        }
        state.requests_in_window += 1;
        true
    }

    async fn fetch_subreddit(
        &self,
        subreddit: &str,
        window: &FetchWindow,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let url = format!(
            "{}/r/{}/new.json?limit={}",
            self.config.base_url, subreddit, self.config.max_posts
        );

        let response = self.client.get(&url).send().await?;
        if response.status().is_server_error() {
            return Err(FetchError::SourceUnavailable(format!(
                "r/{subreddit} returned {}",
                response.status()
            )));
        }

        let listing: RedditListing = response
            .json()
            .await
            .map_err(|err| FetchError::SourceUnavailable(format!("r/{subreddit}: {err}")))?;

        let articles = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| !post.over_18 && post.score >= self.config.min_score)
            .filter_map(|post| {
                let timestamp = DateTime::from_timestamp(post.created_utc as i64, 0)?;
                if !window.contains(timestamp) {
                    return None;
                }
                // External links point at the article itself; self posts
                // live on reddit.
                let url = if post.is_self {
                    format!("{}{}", self.config.base_url, post.permalink)
                } else {
                    post.url
                };
                Some(RawArticle {
                    url,
                    title: post.title,
                    source_domain: None,
                    summary: if post.selftext.is_empty() {
                        None
                    } else {
                        Some(post.selftext.clone())
                    },
                    snippet: if post.selftext.is_empty() {
                        None
                    } else {
                        Some(post.selftext)
                    },
                    timestamp: Some(timestamp),
                })
            })
            .collect();

        Ok(articles)
    }
}

#[async_trait]
impl NewsSource for RedditMonitor {
    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawArticle>, FetchError> {
        let mut articles = Vec::new();
        let mut failures = 0usize;

        for subreddit in &self.config.subreddits {
            if !self.try_acquire_request().await {
                tracing::warn!(subreddit = %subreddit, "Reddit rate limit reached; skipping");
                break;
            }
            match self.fetch_subreddit(subreddit, &window).await {
                Ok(mut batch) => articles.append(&mut batch),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(subreddit = %subreddit, error = %err, "Subreddit fetch failed");
                }
            }
        }

        if !self.config.subreddits.is_empty() && failures == self.config.subreddits.len() {
            return Err(FetchError::SourceUnavailable(
                "all subreddits failed".to_string(),
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

    fn test_config(base_url: String, subreddits: Vec<String>) -> RedditConfig {
        RedditConfig {
            base_url,
            subreddits,
            ..RedditConfig::new(Duration::from_secs(5))
        }
    }

    #[tokio::test]
    async fn test_fetch_filters_low_score_and_window() {
        let server = MockServer::start().await;
        let now = Utc::now();
        let fresh = now.timestamp();
        let stale = (now - chrono::Duration::hours(3)).timestamp();

        Mock::given(method("GET"))
            .and(path("/r/worldnews/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "children": [
                    { "data": {
                        "title": "Bridge collapse injures dozens",
                        "selftext": "",
                        "permalink": "/r/worldnews/1",
                        "url": "https://example.com/bridge",
                        "created_utc": fresh,
                        "score": 500,
                        "is_self": false,
                        "over_18": false
                    }},
                    { "data": {
                        "title": "Low score post",
                        "selftext": "",
                        "permalink": "/r/worldnews/2",
                        "url": "https://example.com/low",
                        "created_utc": fresh,
                        "score": 2,
                        "is_self": false,
                        "over_18": false
                    }},
                    { "data": {
                        "title": "Too old",
                        "selftext": "",
                        "permalink": "/r/worldnews/3",
                        "url": "https://example.com/old",
                        "created_utc": stale,
                        "score": 900,
                        "is_self": false,
                        "over_18": false
                    }}
                ]}
            })))
            .mount(&server)
            .await;

        let monitor = RedditMonitor::new(test_config(
            server.uri(),
            vec!["worldnews".to_string()],
        ));
        let window = FetchWindow::ending_at(now + chrono::Duration::minutes(1), 15);
        let articles = monitor.fetch(window).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://example.com/bridge");
    }

    #[tokio::test]
    async fn test_rate_limiter_counts_requests() {
        let monitor = RedditMonitor::new(test_config(
            "http://localhost:9".to_string(),
            vec![],
        ));
        for _ in 0..60 {
            assert!(monitor.try_acquire_request().await);
        }
        assert!(!monitor.try_acquire_request().await);
    }
}
