//! Ranking
//!
//! Orders candidate events for a presentation section. Pure over its
//! input: the same slice and section always produce the same order.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::event::{Category, Event};

/// Presentation slice with its own weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Confirmed,
    Developing,
    Conflicts,
    All,
}

impl Section {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Section::Confirmed),
            "developing" => Some(Section::Developing),
            "conflicts" => Some(Section::Conflicts),
            "all" => Some(Section::All),
            _ => None,
        }
    }

    /// Weights applied to (aged importance, quality, recency).
    pub fn weights(&self) -> RankWeights {
        match self {
            Section::Confirmed => RankWeights {
                importance: 0.20,
                quality: 0.20,
                recency: 0.60,
            },
            Section::Developing => RankWeights {
                importance: 0.20,
                quality: 0.15,
                recency: 0.65,
            },
            Section::Conflicts => RankWeights {
                importance: 0.40,
                quality: 0.15,
                recency: 0.45,
            },
            Section::All => RankWeights {
                importance: 0.15,
                quality: 0.20,
                recency: 0.65,
            },
        }
    }
}

/// Section weighting over the three rank components.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub importance: f64,
    pub quality: f64,
    pub recency: f64,
}

/// Importance decayed by a one-week half-life-style curve.
pub fn aged_importance(importance_score: f64, hours_old: f64) -> f64 {
    importance_score * (-hours_old / 168.0).exp()
}

/// Smooth monotonic recency decay: flat for the first four hours, then
/// exponential with a 48-hour constant.
pub fn recency_score(hours_old: f64) -> f64 {
    if hours_old <= 4.0 {
        1.0
    } else {
        0.8 * (-(hours_old - 4.0) / 48.0).exp()
    }
}

/// Truth-weighted quality with a source-count kicker.
pub fn quality_score(truth_score: f64, unique_sources: i64) -> f64 {
    0.6 * (truth_score / 100.0) + 0.4 * (unique_sources as f64 / 5.0).min(1.0)
}

/// Momentum multiplier for fresh busy events and dormant empty ones.
pub fn momentum_multiplier(hours_old: f64, articles_count: i64) -> f64 {
    if hours_old <= 24.0 && articles_count >= 5 {
        1.08
    } else if hours_old > 72.0 && articles_count == 0 {
        0.90
    } else {
        1.00
    }
}

/// Stateless event ranker.
pub struct Ranker;

impl Ranker {
    /// Rank candidates for a section. Filters have already been applied;
    /// this only orders.
    pub fn rank(&self, events: Vec<Event>, section: Section, now: DateTime<Utc>) -> Vec<Event> {
        let weights = section.weights();

        let mut scored: Vec<(Event, f64)> = events
            .into_iter()
            .map(|event| {
                let base = base_score(&event, &weights, now);
                (event, base)
            })
            .collect();
        sort_scored(&mut scored);

        // Diversity pass over the base ordering.
        let top_categories: HashMap<Category, usize> = scored
            .iter()
            .take(10)
            .fold(HashMap::new(), |mut counts, (event, _)| {
                *counts.entry(event.category).or_default() += 1;
                counts
            });
        let lead_category = scored.first().map(|(event, _)| event.category);

        let adjusted: Vec<(Event, f64)> = scored
            .into_iter()
            .enumerate()
            .map(|(index, (event, base))| {
                let position = index + 1;
                let boost = diversity_boost(
                    position,
                    event.category,
                    lead_category,
                    &top_categories,
                );
                (event, base * (1.0 + boost))
            })
            .collect();

        let mut final_scored = adjusted;
        sort_scored(&mut final_scored);
        final_scored.into_iter().map(|(event, _)| event).collect()
    }
}

fn base_score(event: &Event, weights: &RankWeights, now: DateTime<Utc>) -> f64 {
    let hours_old = (now - event.last_seen).num_seconds().max(0) as f64 / 3600.0;
    let aged = aged_importance(event.importance_score, hours_old) / 100.0;
    let quality = quality_score(event.truth_score, event.unique_sources);
    let recency = recency_score(hours_old);
    let momentum = momentum_multiplier(hours_old, event.articles_count);

    (aged * weights.importance + quality * weights.quality + recency * weights.recency) * momentum
}

/// Position-dependent boost from the category distribution of the top 10.
/// An event's own slot does not count against it.
fn diversity_boost(
    position: usize,
    category: Category,
    lead_category: Option<Category>,
    top_categories: &HashMap<Category, usize>,
) -> f64 {
    let mut occurrences = top_categories.get(&category).copied().unwrap_or(0);
    if position <= 10 && occurrences > 0 {
        occurrences -= 1; // exclude the event itself
    }

    match position {
        1 => 0.0,
        2..=3 => {
            if lead_category.map(|lead| lead != category).unwrap_or(false) {
                0.03
            } else {
                0.0
            }
        }
        4..=20 => match occurrences {
            0 => 0.10,
            1 => 0.05,
            _ => 0.0,
        },
        _ => {
            if occurrences == 0 {
                0.15
            } else {
                0.0
            }
        }
    }
}

/// Deterministic order: score descending, then last_seen descending,
/// then id ascending.
fn sort_scored(scored: &mut [(Event, f64)]) {
    scored.sort_by(|(a, score_a), (b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.id.cmp(&b.id))
    });
}
