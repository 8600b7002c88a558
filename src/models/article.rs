//! Article records
//!
//! A `RawArticle` is what a fetcher returns; a `NewArticle` is what the
//! normalizer hands to the store; an `Article` is a persisted row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fact-check outcome for an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCheckStatus {
    Unchecked,
    Verified,
    Disputed,
    False,
    Unverifiable,
}

impl FactCheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactCheckStatus::Unchecked => "unchecked",
            FactCheckStatus::Verified => "verified",
            FactCheckStatus::Disputed => "disputed",
            FactCheckStatus::False => "false",
            FactCheckStatus::Unverifiable => "unverifiable",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "verified" => FactCheckStatus::Verified,
            "disputed" => FactCheckStatus::Disputed,
            "false" => FactCheckStatus::False,
            "unverifiable" => FactCheckStatus::Unverifiable,
            _ => FactCheckStatus::Unchecked,
        }
    }
}

/// One checked claim attached to an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheckFlag {
    pub claim: String,
    pub verdict: String,
    pub evidence_url: Option<String>,
    pub confidence: f64,
}

/// An item as returned by a fetcher, before normalization.
///
/// Only `url`, `title` and `source_domain` are guaranteed; everything else
/// is best-effort per source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub url: String,
    pub title: String,
    pub source_domain: Option<String>,
    pub summary: Option<String>,
    pub snippet: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A normalized article ready for insertion.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Canonical URL (globally unique).
    pub url: String,
    pub source_domain: String,
    pub title: String,
    pub summary: String,
    pub snippet: String,
    pub timestamp: DateTime<Utc>,
    pub language: String,
    /// Noun-phrase entities in textual order, capped at 50.
    pub entities: Vec<String>,
}

/// A persisted article.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub source_domain: String,
    pub title: String,
    pub summary: String,
    pub snippet: String,
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub language: String,
    pub entities: Vec<String>,
    pub cluster_id: Option<i64>,
    /// 384-dim L2-normalized vector, computed lazily. Not serialized.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub fact_check_status: FactCheckStatus,
    pub fact_check_flags: Vec<FactCheckFlag>,
}

/// Raw row shape of `articles_raw`; converted into [`Article`].
#[derive(Debug, FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub url: String,
    pub source_domain: String,
    pub title: String,
    pub summary: String,
    pub snippet: String,
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub language: String,
    pub entities_json: String,
    pub cluster_id: Option<i64>,
    pub embedding_blob: Option<Vec<u8>>,
    pub fact_check_status: String,
    pub fact_check_flags_json: String,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            url: row.url,
            source_domain: row.source_domain,
            title: row.title,
            summary: row.summary,
            snippet: row.snippet,
            timestamp: row.timestamp,
            ingested_at: row.ingested_at,
            language: row.language,
            entities: serde_json::from_str(&row.entities_json).unwrap_or_default(),
            cluster_id: row.cluster_id,
            embedding: row.embedding_blob.as_deref().map(blob_to_embedding),
            fact_check_status: FactCheckStatus::parse(&row.fact_check_status),
            fact_check_flags: serde_json::from_str(&row.fact_check_flags_json)
                .unwrap_or_default(),
        }
    }
}

/// Encode an embedding as a little-endian f32 blob.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Decode a little-endian f32 blob back into an embedding.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_round_trip() {
        let embedding = vec![0.25_f32, -1.5, 0.0, 3.75];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn test_fact_check_status_parse() {
        assert_eq!(FactCheckStatus::parse("verified"), FactCheckStatus::Verified);
        assert_eq!(FactCheckStatus::parse("bogus"), FactCheckStatus::Unchecked);
        assert_eq!(FactCheckStatus::Disputed.as_str(), "disputed");
    }
}
