//! Scoring
//!
//! Computes the truth score and its breakdown, coherence and conflict
//! severity, narrative perspectives, the bias compass, category and
//! politics flags, and the importance score for an event's membership.
//! All scores are pure functions of the member articles: identical inputs
//! yield identical outputs.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::article::Article;
use crate::models::event::{
    BiasCompass, Category, ConflictExplanation, ConflictSeverity, DetailAxis, DifferenceType,
    GeographicAxis, InternationalCoverage, Perspective, PoliticalAxis, ScoreComponent,
    ScoringBreakdown, ToneAxis,
};
use crate::models::source::{is_major_wire, is_official_domain, Region, SourceRegistry};
use crate::services::processing::clustering::{dbscan, ClusterParams};
use crate::services::processing::embedding::cosine_distance;
use crate::services::processing::normalizer::truncate_snippet;
use crate::services::processing::sentiment::sentiment_of;
use crate::services::store::ScoreUpdate;

/// Truth score component weights.
const WEIGHT_SOURCE_DIVERSITY: f64 = 0.25;
const WEIGHT_GEO_DIVERSITY: f64 = 0.40;
const WEIGHT_PRIMARY_EVIDENCE: f64 = 0.20;
const WEIGHT_OFFICIAL_MATCH: f64 = 0.15;

/// Importance component weights.
const WEIGHT_GROWTH: f64 = 0.35;
const WEIGHT_IMPORTANCE_GEO: f64 = 0.25;
const WEIGHT_POLITICAL_DIVERSITY: f64 = 0.20;
const WEIGHT_SALIENCE: f64 = 0.20;

/// Keywords marking political entities independent of the category.
const POLITICAL_ENTITY_TERMS: &[&str] = &[
    "senate", "congress", "parliament", "president", "prime minister", "minister",
    "white house", "kremlin", "chancellor", "governor", "election", "legislature",
    "security council", "state department", "downing street",
];

/// Event scorer over member articles.
pub struct Scorer {
    registry: SourceRegistry,
    /// Tighter density parameters used to split a conflicted event into
    /// perspectives.
    subcluster_params: ClusterParams,
    categories: Vec<(Category, Vec<&'static str>)>,
}

impl Scorer {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            subcluster_params: ClusterParams {
                eps: 0.2,
                min_samples: 2,
            },
            categories: category_lexicons(),
        }
    }

    /// Score an event's prospective membership. `include_excerpts`
    /// controls the capped Tier-3 excerpt extraction.
    pub fn score_event(
        &self,
        members: &[Article],
        now: DateTime<Utc>,
        include_excerpts: bool,
    ) -> ScoreUpdate {
        let breakdown = self.truth_breakdown(members);
        let truth_score = truth_score_from(&breakdown);

        let coherence_score = coherence(members);
        let conflict_severity = ConflictSeverity::from_coherence(coherence_score);
        let has_conflict = conflict_severity != ConflictSeverity::None;

        let conflict_explanation = if has_conflict {
            self.explain_conflict(members, include_excerpts)
        } else {
            None
        };

        let (category, category_confidence) = self.classify(members);
        let politics_flag = category == Category::Politics || self.has_political_entities(members);

        let bias_compass = self.bias_compass(members);
        let international_coverage = self.international_coverage(members);

        let importance_score =
            self.importance(members, coherence_score, now);

        ScoreUpdate {
            truth_score,
            importance_score,
            coherence_score,
            has_conflict,
            conflict_severity,
            conflict_explanation,
            bias_compass: Some(bias_compass),
            international_coverage: Some(international_coverage),
            category,
            category_confidence,
            politics_flag,
            evidence_flag: breakdown.primary_evidence.value > 0.0,
            official_match: breakdown.official_match.value > 0.0,
        }
    }

    /// Truth score components with explanations for the detail endpoint.
    pub fn truth_breakdown(&self, members: &[Article]) -> ScoringBreakdown {
        let domains: HashSet<&str> = members.iter().map(|m| m.source_domain.as_str()).collect();
        let tlds: HashSet<&str> = members
            .iter()
            .filter_map(|m| m.source_domain.rsplit('.').next())
            .collect();

        let source_value = (domains.len() as f64 / 5.0).min(1.0);
        let geo_value = (tlds.len() as f64 / 4.0).min(1.0);

        let official: Vec<&Article> = members
            .iter()
            .filter(|m| is_official_domain(&m.source_domain))
            .collect();
        let evidence_value = if official.is_empty() { 0.0 } else { 1.0 };

        let official_value = official_match_value(members, &official);

        ScoringBreakdown {
            source_diversity: ScoreComponent {
                value: source_value,
                weight: WEIGHT_SOURCE_DIVERSITY,
                explanation: format!("{} distinct source domains", domains.len()),
            },
            geo_diversity: ScoreComponent {
                value: geo_value,
                weight: WEIGHT_GEO_DIVERSITY,
                explanation: format!("{} distinct top-level domains", tlds.len()),
            },
            primary_evidence: ScoreComponent {
                value: evidence_value,
                weight: WEIGHT_PRIMARY_EVIDENCE,
                explanation: if official.is_empty() {
                    "no official feed among sources".to_string()
                } else {
                    format!("official feed coverage from {}", official[0].source_domain)
                },
            },
            official_match: ScoreComponent {
                value: official_value,
                weight: WEIGHT_OFFICIAL_MATCH,
                explanation: if official_value > 0.0 {
                    "official report within 6 hours of first coverage".to_string()
                } else {
                    "no timely official report".to_string()
                },
            },
        }
    }

    /// Importance in [0, 100]: growth, geographic reach, political
    /// diversity, and coherence-adjusted salience.
    fn importance(&self, members: &[Article], coherence_score: f64, now: DateTime<Utc>) -> f64 {
        let count = members.len();
        if count == 0 {
            return 0.0;
        }

        let recent = members
            .iter()
            .filter(|m| m.ingested_at >= now - Duration::hours(4))
            .count();
        let growth = recent as f64 / count as f64;

        let tlds: HashSet<&str> = members
            .iter()
            .filter_map(|m| m.source_domain.rsplit('.').next())
            .collect();
        let geo = (tlds.len() as f64 / 4.0).min(1.0);

        let political = self.political_entropy(members);
        let salience = (coherence_score / 100.0) * (count as f64 / 10.0).min(1.0);

        let importance = 100.0
            * (WEIGHT_GROWTH * growth
                + WEIGHT_IMPORTANCE_GEO * geo
                + WEIGHT_POLITICAL_DIVERSITY * political
                + WEIGHT_SALIENCE * salience);
        importance.clamp(0.0, 100.0)
    }

    /// Shannon entropy of the aggregate political distribution, normalized
    /// to [0, 1].
    fn political_entropy(&self, members: &[Article]) -> f64 {
        if members.is_empty() {
            return 0.0;
        }
        let mut left = 0.0;
        let mut center = 0.0;
        let mut right = 0.0;
        for member in members {
            let profile = self.registry.profile(&member.source_domain);
            left += profile.political.left;
            center += profile.political.center;
            right += profile.political.right;
        }
        let total = left + center + right;
        if total <= 0.0 {
            return 0.0;
        }
        let entropy: f64 = [left / total, center / total, right / total]
            .into_iter()
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.ln())
            .sum();
        entropy / 3f64.ln()
    }

    /// Split a conflicted event into perspectives via tighter density
    /// clustering; falls back to a tone split when density finds no
    /// structure.
    fn explain_conflict(
        &self,
        members: &[Article],
        include_excerpts: bool,
    ) -> Option<ConflictExplanation> {
        let groups = self.perspective_groups(members);
        if groups.len() < 2 {
            return None;
        }

        let perspectives: Vec<Perspective> = groups
            .iter()
            .map(|group| self.build_perspective(members, group, include_excerpts))
            .collect();

        let difference_type = self.difference_type(&perspectives);
        Some(ConflictExplanation {
            difference_type,
            perspectives,
        })
    }

    /// Indices of the two largest sub-groups.
    fn perspective_groups(&self, members: &[Article]) -> Vec<Vec<usize>> {
        let embedded: Vec<(usize, &Vec<f32>)> = members
            .iter()
            .enumerate()
            .filter_map(|(idx, m)| m.embedding.as_ref().map(|e| (idx, e)))
            .collect();

        let mut groups: Vec<Vec<usize>> = Vec::new();
        if embedded.len() >= 2 {
            let vectors: Vec<Vec<f32>> = embedded.iter().map(|(_, e)| (*e).clone()).collect();
            let labels = dbscan(&vectors, &self.subcluster_params);
            let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (position, label) in labels.iter().enumerate() {
                if let Some(label) = label {
                    by_label.entry(*label).or_default().push(embedded[position].0);
                }
            }
            groups = by_label.into_values().collect();
            groups.sort_by_key(|g| std::cmp::Reverse(g.len()));
            groups.truncate(2);
        }

        if groups.len() < 2 {
            // No density structure: split along the tone axis of the
            // source profiles.
            let mut factual = Vec::new();
            let mut sensational = Vec::new();
            for (idx, member) in members.iter().enumerate() {
                let profile = self.registry.profile(&member.source_domain);
                if profile.tone.sensational > profile.tone.factual {
                    sensational.push(idx);
                } else {
                    factual.push(idx);
                }
            }
            if !factual.is_empty() && !sensational.is_empty() {
                groups = vec![factual, sensational];
                groups.sort_by_key(|g| std::cmp::Reverse(g.len()));
            }
        }

        groups
    }

    fn build_perspective(
        &self,
        members: &[Article],
        group: &[usize],
        include_excerpts: bool,
    ) -> Perspective {
        let articles: Vec<&Article> = group.iter().map(|idx| &members[*idx]).collect();

        let mut sources: Vec<String> = articles
            .iter()
            .map(|a| a.source_domain.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        sources.sort();

        let representative_title = self
            .representative_member(&articles)
            .map(|a| a.title.clone())
            .unwrap_or_default();

        // Top entities by frequency, ties broken by first appearance.
        let mut entity_counts: Vec<(String, usize)> = Vec::new();
        for article in &articles {
            for entity in &article.entities {
                let key = entity.to_lowercase();
                if let Some(slot) = entity_counts.iter_mut().find(|(e, _)| *e == key) {
                    slot.1 += 1;
                } else {
                    entity_counts.push((key, 1));
                }
            }
        }
        entity_counts.sort_by(|a, b| b.1.cmp(&a.1));
        let key_entities: Vec<String> = entity_counts
            .into_iter()
            .take(5)
            .map(|(entity, _)| entity)
            .collect();

        let sentiment = sentiment_of(
            articles
                .iter()
                .map(|a| a.title.as_str())
                .chain(articles.iter().map(|a| a.snippet.as_str())),
        );

        let political_leaning = self.dominant_leaning(&articles);

        let representative_excerpts = if include_excerpts {
            articles
                .iter()
                .filter(|a| !a.snippet.is_empty())
                .take(3)
                .map(|a| truncate_snippet(&a.snippet, 280))
                .collect()
        } else {
            Vec::new()
        };

        Perspective {
            sources,
            article_count: articles.len(),
            representative_title,
            key_entities,
            sentiment,
            political_leaning,
            representative_excerpts,
        }
    }

    /// Member closest to the group's embedding centroid; first member when
    /// no embeddings exist.
    fn representative_member<'a>(&self, articles: &[&'a Article]) -> Option<&'a Article> {
        let embedded: Vec<&&Article> = articles
            .iter()
            .filter(|a| a.embedding.is_some())
            .collect();
        if embedded.is_empty() {
            return articles.first().copied();
        }

        let dim = embedded[0].embedding.as_ref().map(|e| e.len()).unwrap_or(0);
        let mut centroid = vec![0.0f32; dim];
        for article in &embedded {
            if let Some(embedding) = &article.embedding {
                for (slot, value) in centroid.iter_mut().zip(embedding.iter()) {
                    *slot += value;
                }
            }
        }
        for value in centroid.iter_mut() {
            *value /= embedded.len() as f32;
        }

        embedded
            .into_iter()
            .min_by(|a, b| {
                let da = cosine_distance(&centroid, a.embedding.as_ref().unwrap());
                let db = cosine_distance(&centroid, b.embedding.as_ref().unwrap());
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }

    fn dominant_leaning(&self, articles: &[&Article]) -> String {
        let mut left = 0.0;
        let mut center = 0.0;
        let mut right = 0.0;
        for article in articles {
            let profile = self.registry.profile(&article.source_domain);
            left += profile.political.left;
            center += profile.political.center;
            right += profile.political.right;
        }
        if left > center && left > right {
            "left".to_string()
        } else if right > center && right > left {
            "right".to_string()
        } else {
            "center".to_string()
        }
    }

    fn difference_type(&self, perspectives: &[Perspective]) -> DifferenceType {
        let leanings: HashSet<&str> = perspectives
            .iter()
            .map(|p| p.political_leaning.as_str())
            .collect();
        if leanings.len() > 1 {
            return DifferenceType::Political;
        }

        let regions: HashSet<Region> = perspectives
            .iter()
            .filter_map(|p| self.dominant_region(&p.sources))
            .collect();
        if regions.len() > 1 {
            return DifferenceType::Geographic;
        }

        let sentiments: HashSet<_> = perspectives.iter().map(|p| p.sentiment).collect();
        if sentiments.len() > 1 {
            return DifferenceType::Framing;
        }

        DifferenceType::Factual
    }

    fn dominant_region(&self, sources: &[String]) -> Option<Region> {
        let mut counts: HashMap<Region, usize> = HashMap::new();
        for source in sources {
            *counts.entry(self.registry.profile(source).region).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(region, _)| region)
    }

    /// Mean of the member source profiles along each axis.
    fn bias_compass(&self, members: &[Article]) -> BiasCompass {
        if members.is_empty() {
            return BiasCompass::default();
        }
        let n = members.len() as f64;
        let mut compass = BiasCompass::default();
        for member in members {
            let profile = self.registry.profile(&member.source_domain);
            match profile.region {
                Region::Western => compass.geographic.western += 1.0,
                Region::Eastern => compass.geographic.eastern += 1.0,
                Region::GlobalSouth => compass.geographic.global_south += 1.0,
            }
            compass.political.left += profile.political.left;
            compass.political.center += profile.political.center;
            compass.political.right += profile.political.right;
            compass.tone.sensational += profile.tone.sensational;
            compass.tone.factual += profile.tone.factual;
            compass.detail.surface += profile.detail.surface;
            compass.detail.deep += profile.detail.deep;
        }

        compass.geographic = GeographicAxis {
            western: compass.geographic.western / n,
            eastern: compass.geographic.eastern / n,
            global_south: compass.geographic.global_south / n,
        };
        compass.political = PoliticalAxis {
            left: compass.political.left / n,
            center: compass.political.center / n,
            right: compass.political.right / n,
        };
        compass.tone = ToneAxis {
            sensational: compass.tone.sensational / n,
            factual: compass.tone.factual / n,
        };
        compass.detail = DetailAxis {
            surface: compass.detail.surface / n,
            deep: compass.detail.deep / n,
        };
        compass
    }

    fn international_coverage(&self, members: &[Article]) -> InternationalCoverage {
        let mut coverage = InternationalCoverage::default();
        for member in members {
            match self.registry.profile(&member.source_domain).region {
                Region::Western => coverage.western += 1,
                Region::Eastern => coverage.eastern += 1,
                Region::GlobalSouth => coverage.global_south += 1,
            }
        }
        coverage
    }

    /// Keyword classifier over titles and entities.
    fn classify(&self, members: &[Article]) -> (Category, f64) {
        let mut text = String::new();
        for member in members {
            text.push_str(&member.title.to_lowercase());
            text.push(' ');
            for entity in &member.entities {
                text.push_str(&entity.to_lowercase());
                text.push(' ');
            }
        }

        let mut best = (Category::Other, 0usize);
        let mut total_hits = 0usize;
        for (category, keywords) in &self.categories {
            let hits = keywords.iter().filter(|k| text.contains(*k)).count();
            total_hits += hits;
            if hits > best.1 {
                best = (*category, hits);
            }
        }

        if best.1 == 0 {
            return (Category::Other, 0.3);
        }
        let confidence = (best.1 as f64 / total_hits.max(1) as f64)
            .max(0.3)
            .min(1.0);
        (best.0, confidence)
    }

    fn has_political_entities(&self, members: &[Article]) -> bool {
        members.iter().any(|member| {
            member.entities.iter().any(|entity| {
                let lowered = entity.to_lowercase();
                POLITICAL_ENTITY_TERMS
                    .iter()
                    .any(|term| lowered.contains(term))
            })
        })
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(SourceRegistry::builtin())
    }
}

/// Weighted sum of the breakdown, clamped to [0, 100].
pub fn truth_score_from(breakdown: &ScoringBreakdown) -> f64 {
    let score = 100.0
        * (breakdown.source_diversity.value * breakdown.source_diversity.weight
            + breakdown.geo_diversity.value * breakdown.geo_diversity.weight
            + breakdown.primary_evidence.value * breakdown.primary_evidence.weight
            + breakdown.official_match.value * breakdown.official_match.weight);
    score.clamp(0.0, 100.0)
}

/// 100 × (1 − mean pairwise cosine distance) over embedded members.
/// Events with fewer than two embedded members are fully coherent.
pub fn coherence(members: &[Article]) -> f64 {
    let embeddings: Vec<&Vec<f32>> = members
        .iter()
        .filter_map(|m| m.embedding.as_ref())
        .collect();
    if embeddings.len() < 2 {
        return 100.0;
    }

    let mut total = 0.0f64;
    let mut pairs = 0usize;
    for i in 0..embeddings.len() {
        for j in (i + 1)..embeddings.len() {
            total += f64::from(cosine_distance(embeddings[i], embeddings[j]));
            pairs += 1;
        }
    }
    let mean_distance = total / pairs as f64;
    (100.0 * (1.0 - mean_distance)).clamp(0.0, 100.0)
}

/// `max(0.5, 1 − Δt/6h)` when an official report exists within six hours
/// of the earliest non-official coverage, else 0.
fn official_match_value(members: &[Article], official: &[&Article]) -> f64 {
    if official.is_empty() {
        return 0.0;
    }
    let earliest_other = members
        .iter()
        .filter(|m| !is_official_domain(&m.source_domain))
        .map(|m| m.timestamp)
        .min();
    let Some(earliest_other) = earliest_other else {
        // Only official coverage: a perfect match with itself.
        return 1.0;
    };

    let six_hours = Duration::hours(6);
    let closest = official
        .iter()
        .map(|o| {
            (o.timestamp - earliest_other)
                .abs()
                .num_seconds()
        })
        .min()
        .unwrap_or(i64::MAX);

    if closest > six_hours.num_seconds() {
        return 0.0;
    }
    let fraction = closest as f64 / six_hours.num_seconds() as f64;
    (1.0 - fraction).max(0.5)
}

/// Underreported: official/NGO evidence, no major-wire coverage, and the
/// story is older than 48 hours.
pub fn is_underreported(members: &[Article], first_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let has_evidence = members
        .iter()
        .any(|m| is_official_domain(&m.source_domain));
    let has_wire = members.iter().any(|m| is_major_wire(&m.source_domain));
    has_evidence && !has_wire && now - first_seen > Duration::hours(48)
}

fn category_lexicons() -> Vec<(Category, Vec<&'static str>)> {
    vec![
        (
            Category::NaturalDisaster,
            vec![
                "earthquake", "quake", "tsunami", "hurricane", "typhoon", "cyclone", "flood",
                "flooding", "wildfire", "eruption", "volcano", "landslide", "magnitude",
                "tornado", "drought", "aftershock",
            ],
        ),
        (
            Category::Health,
            vec![
                "outbreak", "virus", "vaccine", "epidemic", "pandemic", "disease", "infection",
                "cholera", "malaria", "hospital", "health ministry", "quarantine",
            ],
        ),
        (
            Category::Conflict,
            vec![
                "airstrike", "missile", "ceasefire", "offensive", "troops", "military", "rebels",
                "insurgent", "shelling", "frontline", "war", "invasion", "armed group",
            ],
        ),
        (
            Category::Politics,
            vec![
                "election", "parliament", "senate", "congress", "president", "minister", "vote",
                "coalition", "legislation", "campaign", "impeachment", "referendum", "governor",
                "cabinet", "opposition party",
            ],
        ),
        (
            Category::Business,
            vec![
                "market", "stocks", "economy", "inflation", "earnings", "merger", "trade",
                "tariff", "bankruptcy", "gdp", "central bank", "interest rate",
            ],
        ),
        (
            Category::Science,
            vec![
                "research", "study finds", "telescope", "spacecraft", "species", "climate",
                "physics", "discovery", "scientists", "satellite", "genome",
            ],
        ),
        (
            Category::Technology,
            vec![
                "software", "artificial intelligence", "chip", "startup", "cyberattack", "hack",
                "data breach", "robot", "semiconductor", "app",
            ],
        ),
        (
            Category::Crime,
            vec![
                "police", "arrested", "murder", "theft", "fraud", "trial", "sentenced",
                "suspect", "shooting", "homicide", "smuggling",
            ],
        ),
        (
            Category::Sports,
            vec![
                "championship", "league", "tournament", "olympic", "coach", "match", "cup",
                "player", "stadium", "season opener",
            ],
        ),
        (
            Category::Entertainment,
            vec![
                "film", "movie", "album", "celebrity", "festival", "box office", "concert",
                "actor", "premiere", "streaming series",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::processing::embedding::{embedding_text, Embedder, HashedProjectionEmbedder};

    fn member(
        url: &str,
        domain: &str,
        title: &str,
        timestamp: DateTime<Utc>,
        ingested_at: DateTime<Utc>,
    ) -> Article {
        let embedder = HashedProjectionEmbedder;
        Article {
            id: 0,
            url: url.to_string(),
            source_domain: domain.to_string(),
            title: title.to_string(),
            summary: String::new(),
            snippet: String::new(),
            timestamp,
            ingested_at,
            language: "en".to_string(),
            entities: vec![],
            cluster_id: None,
            embedding: Some(embedder.embed(&embedding_text(title, "")).unwrap()),
            fact_check_status: crate::models::article::FactCheckStatus::Unchecked,
            fact_check_flags: vec![],
        }
    }

    #[test]
    fn test_truth_score_rewards_diversity_and_evidence() {
        let now = Utc::now();
        let scorer = Scorer::default();

        let domains = [
            "usgs.gov",
            "example.com",
            "news.co.uk",
            "presse.fr",
            "asahi.jp",
            "outback.au",
        ];
        let members: Vec<Article> = domains
            .iter()
            .enumerate()
            .map(|(i, domain)| {
                member(
                    &format!("https://{domain}/{i}"),
                    domain,
                    "Strong earthquake shakes the coast",
                    now - Duration::minutes(5),
                    now,
                )
            })
            .collect();

        let breakdown = scorer.truth_breakdown(&members);
        assert_eq!(breakdown.source_diversity.value, 1.0);
        assert_eq!(breakdown.geo_diversity.value, 1.0);
        assert_eq!(breakdown.primary_evidence.value, 1.0);
        assert!(breakdown.official_match.value > 0.9);

        let score = truth_score_from(&breakdown);
        assert!(score > 95.0 && score <= 100.0);
    }

    #[test]
    fn test_truth_score_is_deterministic() {
        let now = Utc::now();
        let scorer = Scorer::default();
        let members = vec![
            member("https://a.com/1", "a.com", "flood in the valley", now, now),
            member("https://b.org/2", "b.org", "flood in the valley town", now, now),
        ];
        let first = scorer.score_event(&members, now, false);
        let second = scorer.score_event(&members, now, false);
        assert_eq!(first.truth_score, second.truth_score);
        assert_eq!(first.importance_score, second.importance_score);
        assert_eq!(first.coherence_score, second.coherence_score);
    }

    #[test]
    fn test_official_match_decays_with_delay() {
        let now = Utc::now();
        let close = vec![
            member("https://usgs.gov/1", "usgs.gov", "m7 event", now, now),
            member("https://a.com/1", "a.com", "quake", now + Duration::minutes(10), now),
        ];
        let far = vec![
            member("https://usgs.gov/1", "usgs.gov", "m7 event", now, now),
            member("https://a.com/1", "a.com", "quake", now + Duration::hours(5), now),
        ];
        let none = vec![
            member("https://usgs.gov/1", "usgs.gov", "m7 event", now, now),
            member("https://a.com/1", "a.com", "quake", now + Duration::hours(7), now),
        ];

        let scorer = Scorer::default();
        let close_value = scorer.truth_breakdown(&close).official_match.value;
        let far_value = scorer.truth_breakdown(&far).official_match.value;
        let none_value = scorer.truth_breakdown(&none).official_match.value;

        assert!(close_value > far_value);
        assert_eq!(far_value, 0.5); // floor applies inside the window
        assert_eq!(none_value, 0.0);
    }

    #[test]
    fn test_coherent_members_have_no_conflict() {
        let now = Utc::now();
        let scorer = Scorer::default();
        let members: Vec<Article> = (0..4)
            .map(|i| {
                member(
                    &format!("https://s{i}.com/x"),
                    &format!("s{i}.com"),
                    "magnitude seven earthquake strikes island coast overnight",
                    now,
                    now,
                )
            })
            .collect();

        let update = scorer.score_event(&members, now, false);
        assert!(update.coherence_score > 95.0);
        assert!(!update.has_conflict);
        assert_eq!(update.conflict_severity, ConflictSeverity::None);
        assert!(update.conflict_explanation.is_none());
    }

    #[test]
    fn test_divergent_members_produce_two_perspectives() {
        let now = Utc::now();
        let scorer = Scorer::default();
        let mut members = Vec::new();
        for (i, title) in [
            "peaceful protest gathers downtown as crowds march calmly",
            "peaceful protest gathers downtown as marchers sing calmly",
            "peaceful protest gathers downtown as organizers march calmly",
        ]
        .iter()
        .enumerate()
        {
            members.push(member(
                &format!("https://calm{i}.com/x"),
                "reuters.com",
                title,
                now,
                now,
            ));
        }
        for (i, title) in [
            "violent riot erupts overnight with looting chaos everywhere",
            "violent riot erupts overnight with burning chaos everywhere",
            "violent riot erupts overnight with rampant chaos everywhere",
        ]
        .iter()
        .enumerate()
        {
            members.push(member(
                &format!("https://loud{i}.com/x"),
                "nypost.com",
                title,
                now,
                now,
            ));
        }

        let update = scorer.score_event(&members, now, true);
        assert!(update.coherence_score < 50.0);
        assert!(update.has_conflict);
        let explanation = update.conflict_explanation.expect("explanation expected");
        assert_eq!(explanation.perspectives.len(), 2);
        assert_eq!(explanation.perspectives[0].article_count, 3);
        assert_eq!(explanation.perspectives[1].article_count, 3);
    }

    #[test]
    fn test_category_classification() {
        let now = Utc::now();
        let scorer = Scorer::default();

        let members = vec![member(
            "https://a.com/1",
            "a.com",
            "Magnitude 6.9 earthquake triggers tsunami warning",
            now,
            now,
        )];
        let (category, confidence) = scorer.classify(&members);
        assert_eq!(category, Category::NaturalDisaster);
        assert!(confidence > 0.5);

        let members = vec![member(
            "https://a.com/2",
            "a.com",
            "Parliament schedules snap election after coalition vote collapses",
            now,
            now,
        )];
        let (category, _) = scorer.classify(&members);
        assert_eq!(category, Category::Politics);
    }

    #[test]
    fn test_politics_flag_from_entities() {
        let now = Utc::now();
        let scorer = Scorer::default();
        let mut article = member("https://a.com/1", "a.com", "storm on the coast", now, now);
        article.entities = vec!["White House".to_string()];
        let update = scorer.score_event(&[article], now, false);
        assert!(update.politics_flag);
    }

    #[test]
    fn test_underreported_detection() {
        let now = Utc::now();
        let first_seen = now - Duration::hours(50);
        let members = vec![
            member("https://reliefweb.int/1", "reliefweb.int", "crisis deepens", first_seen, now),
            member("https://local.org/2", "local.org", "crisis report", first_seen, now),
        ];
        assert!(is_underreported(&members, first_seen, now));

        let mut with_wire = members.clone();
        with_wire.push(member("https://reuters.com/3", "reuters.com", "crisis", first_seen, now));
        assert!(!is_underreported(&with_wire, first_seen, now));

        assert!(!is_underreported(&members, now - Duration::hours(10), now));
    }

    #[test]
    fn test_importance_increases_with_growth() {
        let now = Utc::now();
        let scorer = Scorer::default();

        let fresh: Vec<Article> = (0..6)
            .map(|i| {
                member(
                    &format!("https://s{i}.com/x"),
                    &format!("s{i}.com"),
                    "major story develops rapidly",
                    now,
                    now - Duration::minutes(30),
                )
            })
            .collect();
        let stale: Vec<Article> = (0..6)
            .map(|i| {
                member(
                    &format!("https://s{i}.com/x"),
                    &format!("s{i}.com"),
                    "major story develops rapidly",
                    now - Duration::hours(30),
                    now - Duration::hours(30),
                )
            })
            .collect();

        let fresh_importance = scorer.score_event(&fresh, now, false).importance_score;
        let stale_importance = scorer.score_event(&stale, now, false).importance_score;
        assert!(fresh_importance > stale_importance);
    }
}
