//! Event records
//!
//! An event is a cluster of articles believed to describe the same
//! real-world occurrence, carrying the scoring output used for ranking
//! and presentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Categorical bucket over the truth score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Confirmed,
    Developing,
    Unverified,
}

impl ConfidenceTier {
    /// Threshold function: >= 75 confirmed, >= 40 developing, else unverified.
    pub fn from_score(truth_score: f64) -> Self {
        if truth_score >= 75.0 {
            ConfidenceTier::Confirmed
        } else if truth_score >= 40.0 {
            ConfidenceTier::Developing
        } else {
            ConfidenceTier::Unverified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Confirmed => "confirmed",
            ConfidenceTier::Developing => "developing",
            ConfidenceTier::Unverified => "unverified",
        }
    }
}

/// Severity of a narrative conflict, derived from coherence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    None,
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    /// Coherence >= 70 none, 50-69 low, 30-49 medium, < 30 high.
    pub fn from_coherence(coherence_score: f64) -> Self {
        if coherence_score >= 70.0 {
            ConflictSeverity::None
        } else if coherence_score >= 50.0 {
            ConflictSeverity::Low
        } else if coherence_score >= 30.0 {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::None => "none",
            ConflictSeverity::Low => "low",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "low" => ConflictSeverity::Low,
            "medium" => ConflictSeverity::Medium,
            "high" => ConflictSeverity::High,
            _ => ConflictSeverity::None,
        }
    }
}

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Politics,
    NaturalDisaster,
    Health,
    Conflict,
    Business,
    Science,
    Technology,
    Crime,
    Sports,
    Entertainment,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::NaturalDisaster => "natural_disaster",
            Category::Health => "health",
            Category::Conflict => "conflict",
            Category::Business => "business",
            Category::Science => "science",
            Category::Technology => "technology",
            Category::Crime => "crime",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "politics" => Category::Politics,
            "natural_disaster" => Category::NaturalDisaster,
            "health" => Category::Health,
            "conflict" => Category::Conflict,
            "business" => Category::Business,
            "science" => Category::Science,
            "technology" => Category::Technology,
            "crime" => Category::Crime,
            "sports" => Category::Sports,
            "entertainment" => Category::Entertainment,
            _ => Category::Other,
        }
    }
}

/// Mean polarity of a perspective's articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

/// What kind of disagreement separates the perspectives of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceType {
    Framing,
    Factual,
    Geographic,
    Political,
}

/// One side of a narrative conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perspective {
    pub sources: Vec<String>,
    pub article_count: usize,
    /// Title of the member closest to the perspective centroid.
    pub representative_title: String,
    /// Top entities by frequency, at most 5.
    pub key_entities: Vec<String>,
    pub sentiment: Sentiment,
    pub political_leaning: String,
    /// Up to 3 snippet excerpts, filled by the capped Tier-3 pass.
    pub representative_excerpts: Vec<String>,
}

/// Structured explanation attached to conflicted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictExplanation {
    pub difference_type: DifferenceType,
    pub perspectives: Vec<Perspective>,
}

/// Four-axis source-bias distribution, each axis normalized to sum 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BiasCompass {
    pub geographic: GeographicAxis,
    pub political: PoliticalAxis,
    pub tone: ToneAxis,
    pub detail: DetailAxis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeographicAxis {
    pub western: f64,
    pub eastern: f64,
    pub global_south: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoliticalAxis {
    pub left: f64,
    pub center: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToneAxis {
    pub sensational: f64,
    pub factual: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailAxis {
    pub surface: f64,
    pub deep: f64,
}

/// Article counts per source region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternationalCoverage {
    pub western: u32,
    pub eastern: u32,
    pub global_south: u32,
}

/// One weighted component of the truth score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub value: f64,
    pub weight: f64,
    pub explanation: String,
}

/// Per-component truth score breakdown returned by the detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    pub source_diversity: ScoreComponent,
    pub geo_diversity: ScoreComponent,
    pub primary_evidence: ScoreComponent,
    pub official_match: ScoreComponent,
}

/// A persisted event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub summary: String,
    pub articles_count: i64,
    pub unique_sources: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub truth_score: f64,
    pub importance_score: f64,
    pub coherence_score: f64,
    pub has_conflict: bool,
    pub conflict_severity: ConflictSeverity,
    pub conflict_explanation: Option<ConflictExplanation>,
    pub bias_compass: Option<BiasCompass>,
    pub international_coverage: Option<InternationalCoverage>,
    pub category: Category,
    pub category_confidence: f64,
    pub politics_flag: bool,
    pub evidence_flag: bool,
    pub official_match: bool,
    pub geo_diversity: f64,
    pub retention_frozen: bool,
}

impl Event {
    /// Confidence tier, always derived from the truth score at read time.
    pub fn confidence_tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.truth_score)
    }
}

/// Raw row shape of `events`; converted into [`Event`].
#[derive(Debug, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub summary: String,
    pub articles_count: i64,
    pub unique_sources: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub truth_score: f64,
    pub importance_score: f64,
    pub coherence_score: f64,
    pub has_conflict: bool,
    pub conflict_severity: String,
    pub conflict_explanation_json: Option<String>,
    pub bias_compass_json: Option<String>,
    pub international_coverage_json: Option<String>,
    pub category: String,
    pub category_confidence: f64,
    pub politics_flag: bool,
    pub evidence_flag: bool,
    pub official_match: bool,
    pub geo_diversity: f64,
    pub retention_frozen: bool,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            summary: row.summary,
            articles_count: row.articles_count,
            unique_sources: row.unique_sources,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            truth_score: row.truth_score,
            importance_score: row.importance_score,
            coherence_score: row.coherence_score,
            has_conflict: row.has_conflict,
            conflict_severity: ConflictSeverity::parse(&row.conflict_severity),
            conflict_explanation: row
                .conflict_explanation_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok()),
            bias_compass: row
                .bias_compass_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok()),
            international_coverage: row
                .international_coverage_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok()),
            category: Category::parse(&row.category),
            category_confidence: row.category_confidence,
            politics_flag: row.politics_flag,
            evidence_flag: row.evidence_flag,
            official_match: row.official_match,
            geo_diversity: row.geo_diversity,
            retention_frozen: row.retention_frozen,
        }
    }
}
