//! Embedding Generation
//!
//! Maps `title + " " + summary` to a 384-dim L2-normalized vector. The
//! contract is purity: identical input text yields an identical vector.
//! Two implementations: a deterministic hashed bag-of-tokens projection
//! (always available) and a fastembed sentence model behind the
//! `semantic-model` feature.

use anyhow::Result;
use std::sync::Arc;

/// Dimensionality of every embedding in the system.
pub const EMBEDDING_DIM: usize = 384;

/// Pure text-to-vector mapping.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Embedding input for an article.
pub fn embedding_text(title: &str, summary: &str) -> String {
    let title = title.trim();
    let summary = summary.trim();
    if summary.is_empty() {
        title.to_string()
    } else {
        format!("{title} {summary}")
    }
}

/// Deterministic hashed projection: each token (and adjacent-token bigram)
/// hashes to a signed slot. Texts sharing vocabulary land close in cosine
/// space; the mapping involves no model state.
pub struct HashedProjectionEmbedder;

impl Embedder for HashedProjectionEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect();

        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        for token in &tokens {
            accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn accumulate(vector: &mut [f32], feature: &str, weight: f32) {
    let hash = fnv1a64(feature.as_bytes());
    let slot = (hash % EMBEDDING_DIM as u64) as usize;
    let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
    vector[slot] += sign * weight;
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Normalize in place; the zero vector is left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity; 0.0 when either vector is zero or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine distance used by the clusterer.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// The embedder for this build: the semantic model when compiled in and
/// loadable, the hashed projection otherwise.
pub fn default_embedder() -> Arc<dyn Embedder> {
    #[cfg(feature = "semantic-model")]
    {
        return Arc::new(semantic::SemanticEmbedder::new());
    }
    #[allow(unreachable_code)]
    Arc::new(HashedProjectionEmbedder)
}

#[cfg(feature = "semantic-model")]
mod semantic {
    use super::{l2_normalize, Embedder, EMBEDDING_DIM};
    use anyhow::{Context, Result};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// fastembed-backed sentence embedder (BGE-small-en-v1.5, 384 dims),
    /// lazily initialized on first use.
    pub struct SemanticEmbedder {
        model: Mutex<Option<TextEmbedding>>,
    }

    impl SemanticEmbedder {
        pub fn new() -> Self {
            Self {
                model: Mutex::new(None),
            }
        }
    }

    impl Embedder for SemanticEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut guard = self.model.lock().expect("embedding model lock poisoned");
            if guard.is_none() {
                tracing::info!("Initializing sentence embedding model");
                let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
                    .with_show_download_progress(false);
                *guard = Some(
                    TextEmbedding::try_new(options)
                        .context("Failed to initialize embedding model")?,
                );
            }

            let model = guard.as_ref().expect("model initialized above");
            let mut embeddings = model
                .embed(vec![text.to_string()], None)
                .context("Failed to generate embedding")?;
            let mut embedding = embeddings
                .pop()
                .context("Embedding model returned no output")?;
            embedding.truncate(EMBEDDING_DIM);
            l2_normalize(&mut embedding);
            Ok(embedding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashedProjectionEmbedder;
        let a = embedder.embed("earthquake strikes japan coast").unwrap();
        let b = embedder.embed("earthquake strikes japan coast").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_are_close() {
        let embedder = HashedProjectionEmbedder;
        let a = embedder
            .embed("magnitude 7 earthquake strikes japan coast tsunami warning")
            .unwrap();
        let b = embedder
            .embed("magnitude 7 earthquake strikes japan coast residents flee")
            .unwrap();
        let c = embedder
            .embed("parliament votes on annual budget amendment tomorrow")
            .unwrap();

        assert!(cosine_similarity(&a, &b) > 0.5);
        assert!(cosine_similarity(&a, &c) < 0.3);
    }

    #[test]
    fn test_empty_text_yields_zero_vector() {
        let embedder = HashedProjectionEmbedder;
        let v = embedder.embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert!((cosine_distance(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_text_joins_title_and_summary() {
        assert_eq!(embedding_text(" title ", ""), "title");
        assert_eq!(embedding_text("title", " summary "), "title summary");
    }
}
