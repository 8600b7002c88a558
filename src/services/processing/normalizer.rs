//! Normalizer / dedup
//!
//! Turns raw fetched items into persisted articles: language filter, URL
//! canonicalization, URL uniqueness, title-similarity dedup, entity
//! extraction, snippet truncation, insert. Each insertion is atomic; a
//! duplicate is a skip, never an error.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

use crate::error::StoreError;
use crate::models::article::{NewArticle, RawArticle};
use crate::services::processing::entity_extractor::EntityExtractor;
use crate::services::store::EventStore;

/// Normalizer tunables.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Same-domain title dedup window.
    pub dedup_window_hours: i64,
    /// Token-set similarity above which a title is a near-duplicate.
    pub title_similarity_threshold: f64,
    pub max_summary_chars: usize,
    pub max_snippet_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            dedup_window_hours: 48,
            title_similarity_threshold: 0.90,
            max_summary_chars: 300,
            max_snippet_chars: 2000,
        }
    }
}

/// Counters for one normalize run.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub inserted: Vec<i64>,
    pub skipped_duplicate: usize,
    pub skipped_language: usize,
    pub skipped_similar: usize,
    pub errors: usize,
}

/// Batch normalizer writing into the Event Store.
pub struct Normalizer {
    store: Arc<EventStore>,
    config: NormalizerConfig,
    detector: LanguageDetector,
    extractor: EntityExtractor,
    /// Canonical URLs already handled this process lifetime; a cheap
    /// screen in front of the store's unique index.
    seen_urls: RwLock<HashSet<String>>,
}

impl Normalizer {
    pub fn new(store: Arc<EventStore>, config: NormalizerConfig) -> Self {
        let detector = LanguageDetectorBuilder::from_languages(&[
            Language::English,
            Language::French,
            Language::German,
            Language::Spanish,
            Language::Russian,
        ])
        .build();

        Self {
            store,
            config,
            detector,
            extractor: EntityExtractor::default(),
            seen_urls: RwLock::new(HashSet::new()),
        }
    }

    /// Normalize and insert a batch. Never fails as a whole; per-article
    /// problems are counted and logged.
    pub async fn normalize_batch(
        &self,
        batch: Vec<RawArticle>,
        now: DateTime<Utc>,
    ) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();

        for raw in batch {
            match self.normalize_one(&raw, now).await {
                Ok(NormalizeResult::Inserted(id)) => outcome.inserted.push(id),
                Ok(NormalizeResult::DuplicateUrl) => outcome.skipped_duplicate += 1,
                Ok(NormalizeResult::NotEnglish) => outcome.skipped_language += 1,
                Ok(NormalizeResult::NearDuplicateTitle) => outcome.skipped_similar += 1,
                Err(err) => {
                    outcome.errors += 1;
                    tracing::warn!(url = %raw.url, error = %err, "Failed to normalize article");
                }
            }
        }

        tracing::info!(
            inserted = outcome.inserted.len(),
            duplicates = outcome.skipped_duplicate,
            non_english = outcome.skipped_language,
            near_duplicates = outcome.skipped_similar,
            errors = outcome.errors,
            "Normalize batch complete"
        );

        outcome
    }

    async fn normalize_one(
        &self,
        raw: &RawArticle,
        now: DateTime<Utc>,
    ) -> Result<NormalizeResult> {
        let summary_text = strip_html(raw.summary.as_deref().unwrap_or(""));
        let snippet_source = raw.snippet.as_deref().unwrap_or("");
        let snippet_text = if snippet_source.is_empty() {
            summary_text.clone()
        } else {
            strip_html(snippet_source)
        };

        // 1. Language filter.
        let language_sample = format!("{} {}", raw.title, summary_text);
        if !self.is_english(&language_sample) {
            return Ok(NormalizeResult::NotEnglish);
        }

        // 2. URL canonicalization.
        let url = canonicalize_url(&raw.url)?;
        let source_domain = match &raw.source_domain {
            Some(domain) if !domain.is_empty() => domain.clone(),
            _ => source_domain_of(&url).context("URL has no host")?,
        };

        // 3. URL uniqueness.
        {
            let seen = self.seen_urls.read().await;
            if seen.contains(&url) {
                return Ok(NormalizeResult::DuplicateUrl);
            }
        }
        if self.store.article_url_exists(&url).await? {
            self.seen_urls.write().await.insert(url);
            return Ok(NormalizeResult::DuplicateUrl);
        }

        // 4. Title dedup against the same domain's recent articles.
        let window_start = now - Duration::hours(self.config.dedup_window_hours);
        let recent_titles = self
            .store
            .recent_titles_for_domain(&source_domain, window_start)
            .await?;
        for title in &recent_titles {
            if title_similarity(title, &raw.title) > self.config.title_similarity_threshold {
                return Ok(NormalizeResult::NearDuplicateTitle);
            }
        }

        // 5. Entity extraction, textual order preserved.
        let entities = self
            .extractor
            .extract(&raw.title, &snippet_text);

        // 6. Snippet truncation at a sentence boundary.
        let summary = truncate_snippet(&summary_text, self.config.max_summary_chars);
        let snippet = truncate_snippet(&snippet_text, self.config.max_snippet_chars);

        // 7. Persist.
        let article = NewArticle {
            url: url.clone(),
            source_domain,
            title: raw.title.trim().to_string(),
            summary,
            snippet,
            timestamp: raw.timestamp.unwrap_or(now),
            language: "en".to_string(),
            entities,
        };

        match self.store.insert_article(&article, now).await {
            Ok(id) => {
                self.seen_urls.write().await.insert(url);
                Ok(NormalizeResult::Inserted(id))
            }
            Err(StoreError::DuplicateUrl(_)) => {
                self.seen_urls.write().await.insert(url);
                Ok(NormalizeResult::DuplicateUrl)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Texts too short to judge are kept; everything else must detect as
    /// English.
    fn is_english(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < 20 {
            return true;
        }
        matches!(
            self.detector.detect_language_of(trimmed),
            Some(Language::English)
        )
    }
}

enum NormalizeResult {
    Inserted(i64),
    DuplicateUrl,
    NotEnglish,
    NearDuplicateTitle,
}

/// Canonicalize a URL: lowercased host, tracking params stripped, no
/// fragment, no trailing slash. Deterministic and idempotent.
pub fn canonicalize_url(raw: &str) -> Result<String> {
    let mut parsed = Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {raw}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Unsupported URL scheme: {}", parsed.scheme());
    }
    if parsed.host_str().is_none() {
        bail!("URL has no host: {raw}");
    }

    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
    }

    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || key == "fbclid" || key == "gclid"
}

/// Host of a canonical URL with any `www.` prefix removed.
pub fn source_domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Jaccard similarity over lowercased alphanumeric token sets.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = title_tokens(a);
    let tokens_b = title_tokens(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

fn title_tokens(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Truncate to at most `max_chars` characters, preferring the last
/// sentence boundary, then the last word boundary.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let head: String = trimmed.chars().take(max_chars).collect();
    if let Some(boundary) = head.rfind(['.', '!', '?']) {
        return head[..=boundary].trim().to_string();
    }
    if let Some(space) = head.rfind(char::is_whitespace) {
        return head[..space].trim().to_string();
    }
    head
}

/// Flatten HTML to text; plain text passes through unchanged.
pub fn strip_html(input: &str) -> String {
    if !input.contains('<') {
        return input.trim().to_string();
    }
    let fragment = scraper::Html::parse_fragment(input);
    let text: Vec<&str> = fragment.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}
