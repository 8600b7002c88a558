//! Lexicon-based sentiment
//!
//! Coarse polarity used to label perspectives. A small news-domain word
//! list is enough here; the output is only the three-way bucket.

use crate::models::event::Sentiment;
use std::collections::HashSet;
use std::sync::OnceLock;

const POSITIVE_WORDS: &[&str] = &[
    "agreement", "aid", "breakthrough", "calm", "celebrate", "ceasefire", "cure", "growth",
    "hope", "improve", "improved", "peace", "peaceful", "progress", "recovery", "relief",
    "rescue", "rescued", "resolved", "safe", "stability", "success", "successful", "support",
    "survivors", "truce", "victory", "win",
];

const NEGATIVE_WORDS: &[&str] = &[
    "attack", "blast", "bloody", "brutal", "carnage", "catastrophe", "chaos", "clash",
    "clashes", "collapse", "crisis", "dead", "deadly", "death", "deaths", "destruction",
    "devastating", "disaster", "fear", "fire", "flee", "injured", "killed", "looting",
    "massacre", "outbreak", "panic", "riot", "rioters", "slam", "threat", "toll", "violence",
    "violent", "war", "wounded",
];

fn positive_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| POSITIVE_WORDS.iter().copied().collect())
}

fn negative_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| NEGATIVE_WORDS.iter().copied().collect())
}

/// Polarity in [-1, 1]; 0 when no lexicon word appears.
pub fn polarity(text: &str) -> f64 {
    let mut positive = 0usize;
    let mut negative = 0usize;

    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if positive_set().contains(token) {
            positive += 1;
        } else if negative_set().contains(token) {
            negative += 1;
        }
    }

    if positive + negative == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / (positive + negative) as f64
}

/// Mean polarity of several texts mapped onto the three-way bucket.
pub fn sentiment_of<'a>(texts: impl IntoIterator<Item = &'a str>) -> Sentiment {
    let mut sum = 0.0;
    let mut count = 0usize;
    for text in texts {
        sum += polarity(text);
        count += 1;
    }
    if count == 0 {
        return Sentiment::Neutral;
    }
    let mean = sum / count as f64;
    if mean > 0.1 {
        Sentiment::Positive
    } else if mean < -0.1 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_directions() {
        assert!(polarity("ceasefire brings hope and relief to survivors") > 0.5);
        assert!(polarity("deadly clashes leave dozens injured amid chaos") < -0.5);
        assert_eq!(polarity("the committee will meet on thursday"), 0.0);
    }

    #[test]
    fn test_sentiment_buckets() {
        assert_eq!(
            sentiment_of(["rescue teams celebrate successful recovery"]),
            Sentiment::Positive
        );
        assert_eq!(
            sentiment_of(["violent riot leaves city in chaos"]),
            Sentiment::Negative
        );
        assert_eq!(sentiment_of(["officials met to discuss policy"]), Sentiment::Neutral);
        assert_eq!(sentiment_of([]), Sentiment::Neutral);
    }
}
