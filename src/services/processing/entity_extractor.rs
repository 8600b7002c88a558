//! Entity Extractor
//!
//! Extracts noun-phrase entities (places, organizations, people, named
//! happenings) from article text with pattern matching. Textual order is
//! preserved and duplicates collapse onto the first occurrence.

use regex::Regex;
use std::collections::HashSet;

/// Entity extractor configuration
#[derive(Debug, Clone)]
pub struct EntityExtractorConfig {
    /// Maximum entities kept per article.
    pub max_entities: usize,
    /// Minimum phrase length in characters.
    pub min_length: usize,
}

impl Default for EntityExtractorConfig {
    fn default() -> Self {
        Self {
            max_entities: 50,
            min_length: 3,
        }
    }
}

/// Pattern-based noun-phrase extractor.
pub struct EntityExtractor {
    config: EntityExtractorConfig,
    phrase_pattern: Regex,
    stopwords: HashSet<&'static str>,
}

impl EntityExtractor {
    pub fn new(config: EntityExtractorConfig) -> Self {
        // Runs of capitalized words, optionally joined by a lowercase
        // connective ("Gulf of Mexico", "Centers for Disease Control").
        let phrase_pattern = Regex::new(
            r"\b[A-Z][A-Za-z0-9'\-]*(?:[ \t]+(?:of|for|the|and|al|de|la)[ \t]+[A-Z][A-Za-z0-9'\-]*|[ \t]+[A-Z][A-Za-z0-9'\-]*)*",
        )
        .expect("entity phrase pattern is valid");

        let stopwords: HashSet<&'static str> = [
            "The", "This", "That", "These", "Those", "Their", "There", "They", "What", "When",
            "Where", "Which", "While", "Who", "Why", "How", "After", "Before", "During", "Since",
            "Despite", "Although", "However", "Meanwhile", "According", "Officials", "Sources",
            "Report", "Reports", "Breaking", "News", "Update", "Updates", "Live", "Watch",
            "Video", "Photos", "Opinion", "Analysis", "Exclusive", "Today", "Yesterday",
            "Tomorrow", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
            "Sunday", "January", "February", "March", "April", "June", "July", "August",
            "September", "October", "November", "December", "But", "And", "Not", "New", "More",
            "Over", "Under", "Into", "From", "With", "Without", "About", "Here", "Now", "Two",
            "Three", "Four", "Five", "Many", "Some", "One", "First", "Last", "Least", "Most",
            "Just", "Still", "Inside", "Outside", "Amid", "Among",
        ]
        .into_iter()
        .collect();

        Self {
            config,
            phrase_pattern,
            stopwords,
        }
    }

    /// Extract entities from title and body, in the order they appear.
    /// Title entities come first; the result is capped at `max_entities`.
    pub fn extract(&self, title: &str, body: &str) -> Vec<String> {
        let text = format!("{title}\n{body}");
        let mut entities = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for found in self.phrase_pattern.find_iter(&text) {
            let phrase = found.as_str().trim();
            if !self.is_entity(phrase) {
                continue;
            }
            let normalized = phrase.to_lowercase();
            if seen.insert(normalized) {
                entities.push(phrase.to_string());
                if entities.len() >= self.config.max_entities {
                    break;
                }
            }
        }

        entities
    }

    fn is_entity(&self, phrase: &str) -> bool {
        if phrase.len() < self.config.min_length {
            return false;
        }
        // Single stopword tokens are sentence-initial noise; multi-word
        // phrases starting with one usually are too ("The President" is
        // kept via "President" elsewhere in the text).
        let mut words = phrase.split_whitespace();
        let first = words.next().unwrap_or("");
        if self.stopwords.contains(first) {
            return false;
        }
        true
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(EntityExtractorConfig::default())
    }
}
