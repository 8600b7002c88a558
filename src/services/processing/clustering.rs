//! Clustering
//!
//! Density-based grouping of recent articles into events over cosine
//! distance, with deterministic tie-breaking when a cluster spans
//! existing events. Clustering never fails fatally: errors are logged
//! and memberships are left unchanged.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::models::article::Article;
use crate::models::event::Event;
use crate::services::processing::embedding::{
    cosine_distance, cosine_similarity, embedding_text, Embedder,
};
use crate::services::scoring::Scorer;
use crate::services::store::EventStore;

/// Density clustering parameters.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// Maximum cosine distance between neighbors.
    pub eps: f32,
    /// Minimum neighborhood size (the point itself included) of a core point.
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 0.3,
            min_samples: 3,
        }
    }
}

/// Outcome counters for one clustering run.
#[derive(Debug, Default)]
pub struct ClusterOutcome {
    pub clusters_formed: usize,
    pub events_created: usize,
    pub articles_assigned: usize,
    /// Events whose membership or scores were committed this run.
    pub touched_events: Vec<i64>,
}

/// DBSCAN over cosine distance. Returns one label per input vector;
/// `None` marks noise.
pub fn dbscan(vectors: &[Vec<f32>], params: &ClusterParams) -> Vec<Option<usize>> {
    let n = vectors.len();
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if cosine_distance(&vectors[i], &vectors[j]) <= params.eps {
                neighbors[i].push(j);
                neighbors[j].push(i);
            }
        }
    }

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0usize;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        if neighbors[i].len() + 1 < params.min_samples {
            continue; // noise unless claimed as a border point later
        }

        labels[i] = Some(next_cluster);
        let mut queue = neighbors[i].clone();
        let mut cursor = 0;
        while cursor < queue.len() {
            let point = queue[cursor];
            cursor += 1;

            if !visited[point] {
                visited[point] = true;
                if neighbors[point].len() + 1 >= params.min_samples {
                    queue.extend(neighbors[point].iter().copied());
                }
            }
            if labels[point].is_none() {
                labels[point] = Some(next_cluster);
            }
        }
        next_cluster += 1;
    }

    labels
}

/// Clusterer writing article-event links and the scores computed from the
/// resulting memberships in the same commit.
pub struct Clusterer {
    store: Arc<EventStore>,
    embedder: Arc<dyn Embedder>,
    scorer: Arc<Scorer>,
    params: ClusterParams,
}

impl Clusterer {
    pub fn new(
        store: Arc<EventStore>,
        embedder: Arc<dyn Embedder>,
        scorer: Arc<Scorer>,
        params: ClusterParams,
    ) -> Self {
        Self {
            store,
            embedder,
            scorer,
            params,
        }
    }

    /// Cluster articles ingested within the last `window_hours`. Articles
    /// already belonging to a different event are only re-parented when
    /// they were ingested within the last `reparent_window_hours`.
    pub async fn cluster_window(
        &self,
        window_hours: i64,
        reparent_window_hours: i64,
        now: DateTime<Utc>,
    ) -> ClusterOutcome {
        match self
            .cluster_window_inner(window_hours, reparent_window_hours, now)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "Clustering run failed; memberships unchanged");
                ClusterOutcome::default()
            }
        }
    }

    async fn cluster_window_inner(
        &self,
        window_hours: i64,
        reparent_window_hours: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ClusterOutcome> {
        let since = now - Duration::hours(window_hours);
        let mut articles = self.store.articles_ingested_since(since).await?;

        let mut outcome = ClusterOutcome::default();
        if articles.len() < self.params.min_samples {
            return Ok(outcome);
        }

        let embeddings = self.ensure_embeddings(&mut articles).await;
        let labels = dbscan(&embeddings, &self.params);

        // Group member indices per cluster label, deterministically ordered.
        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.iter().enumerate() {
            if let Some(cluster) = label {
                clusters.entry(*cluster).or_default().push(idx);
            }
        }
        outcome.clusters_formed = clusters.len();

        let reparent_since = now - Duration::hours(reparent_window_hours);
        for (label, member_indices) in clusters {
            match self
                .commit_cluster(&articles, &embeddings, &member_indices, reparent_since, now)
                .await
            {
                Ok(Some((event_id, assigned, created))) => {
                    outcome.articles_assigned += assigned;
                    outcome.touched_events.push(event_id);
                    if created {
                        outcome.events_created += 1;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(cluster = label, error = %err, "Failed to commit cluster");
                }
            }
        }

        tracing::info!(
            clusters = outcome.clusters_formed,
            created = outcome.events_created,
            assigned = outcome.articles_assigned,
            "Clustering run complete"
        );
        Ok(outcome)
    }

    /// Stored embeddings are reused; missing ones are computed and written
    /// back (first writer wins).
    async fn ensure_embeddings(&self, articles: &mut [Article]) -> Vec<Vec<f32>> {
        let mut embeddings = Vec::with_capacity(articles.len());
        for article in articles.iter_mut() {
            if let Some(embedding) = &article.embedding {
                embeddings.push(embedding.clone());
                continue;
            }
            let text = embedding_text(&article.title, &article.summary);
            match self.embedder.embed(&text) {
                Ok(embedding) => {
                    if let Err(err) = self.store.set_embedding(article.id, &embedding).await {
                        tracing::warn!(article_id = article.id, error = %err, "Failed to cache embedding");
                    }
                    article.embedding = Some(embedding.clone());
                    embeddings.push(embedding);
                }
                Err(err) => {
                    tracing::warn!(article_id = article.id, error = %err, "Failed to embed article");
                    embeddings.push(vec![0.0; self.embedder.dimension()]);
                }
            }
        }
        embeddings
    }

    async fn commit_cluster(
        &self,
        articles: &[Article],
        embeddings: &[Vec<f32>],
        member_indices: &[usize],
        reparent_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<(i64, usize, bool)>> {
        // Events already referenced by cluster members.
        let mut referenced: HashMap<i64, usize> = HashMap::new();
        for idx in member_indices {
            if let Some(event_id) = articles[*idx].cluster_id {
                *referenced.entry(event_id).or_default() += 1;
            }
        }

        let mut created = false;
        let target_event_id = if referenced.is_empty() {
            let seed_idx = closest_to_centroid(embeddings, member_indices);
            let seed = &articles[seed_idx];
            created = true;
            self.store
                .create_or_get_event(&seed.title, seed.id)
                .await?
        } else if let Some(majority) = majority_event(&referenced, member_indices.len()) {
            majority
        } else {
            // The cluster spans events without a majority: join the larger
            // event, then the one seen earlier.
            let mut candidates = Vec::new();
            for event_id in referenced.keys() {
                candidates.push(self.store.get_event(*event_id).await?);
            }
            pick_spanning_target(&candidates)
        };

        // Assign members, honoring the re-parenting window.
        let mut new_member_ids = Vec::new();
        for idx in member_indices {
            let article = &articles[*idx];
            match article.cluster_id {
                Some(current) if current == target_event_id => {}
                Some(_) if article.ingested_at < reparent_since => {
                    // Frozen membership outside the reanalysis window.
                }
                _ => new_member_ids.push(article.id),
            }
        }

        // Score over the prospective membership and commit both together.
        let members = self
            .prospective_members(articles, member_indices, target_event_id, &new_member_ids)
            .await?;
        let update = self.scorer.score_event(&members, now, false);

        self.store
            .commit_event_update(target_event_id, &new_member_ids, Some(&update))
            .await?;

        Ok(Some((target_event_id, new_member_ids.len(), created)))
    }

    /// Current event members plus the cluster members about to join.
    async fn prospective_members(
        &self,
        articles: &[Article],
        member_indices: &[usize],
        event_id: i64,
        new_member_ids: &[i64],
    ) -> anyhow::Result<Vec<Article>> {
        let mut members = self.store.articles_for_event(event_id).await?;
        let joining: Vec<&Article> = member_indices
            .iter()
            .map(|idx| &articles[*idx])
            .filter(|a| new_member_ids.contains(&a.id))
            .collect();
        for article in joining {
            if !members.iter().any(|m| m.id == article.id) {
                members.push(article.clone());
            }
        }
        Ok(members)
    }
}

/// The event referenced by more than half of the cluster, if any.
fn majority_event(referenced: &HashMap<i64, usize>, cluster_size: usize) -> Option<i64> {
    referenced
        .iter()
        .find(|(_, count)| **count * 2 > cluster_size)
        .map(|(event_id, _)| *event_id)
}

/// Tie-break for clusters spanning several events: larger membership,
/// then earlier first_seen, then smaller id.
fn pick_spanning_target(candidates: &[Event]) -> i64 {
    let mut best = &candidates[0];
    for candidate in &candidates[1..] {
        let better = candidate.articles_count > best.articles_count
            || (candidate.articles_count == best.articles_count
                && (candidate.first_seen < best.first_seen
                    || (candidate.first_seen == best.first_seen && candidate.id < best.id)));
        if better {
            best = candidate;
        }
    }
    best.id
}

/// Index of the member whose embedding is closest to the cluster centroid.
fn closest_to_centroid(embeddings: &[Vec<f32>], member_indices: &[usize]) -> usize {
    let dim = embeddings
        .first()
        .map(|e| e.len())
        .unwrap_or_default();
    let mut centroid = vec![0.0f32; dim];
    for idx in member_indices {
        for (slot, value) in centroid.iter_mut().zip(embeddings[*idx].iter()) {
            *slot += value;
        }
    }
    let count = member_indices.len() as f32;
    for value in centroid.iter_mut() {
        *value /= count;
    }

    let mut best = member_indices[0];
    let mut best_similarity = f32::MIN;
    for idx in member_indices {
        let similarity = cosine_similarity(&centroid, &embeddings[*idx]);
        if similarity > best_similarity {
            best_similarity = similarity;
            best = *idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let norm = (x * x + y * y).sqrt();
        vec![x / norm, y / norm]
    }

    #[test]
    fn test_dbscan_separates_two_groups() {
        // Two tight bundles far apart in cosine space plus one outlier.
        let vectors = vec![
            unit(1.0, 0.0),
            unit(1.0, 0.05),
            unit(1.0, -0.05),
            unit(0.0, 1.0),
            unit(0.05, 1.0),
            unit(-0.05, 1.0),
            unit(-1.0, -1.0),
        ];
        let labels = dbscan(
            &vectors,
            &ClusterParams {
                eps: 0.05,
                min_samples: 3,
            },
        );

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert!(labels[0].is_some());
        assert!(labels[3].is_some());
        assert_eq!(labels[6], None);
    }

    #[test]
    fn test_dbscan_small_input_is_noise() {
        let vectors = vec![unit(1.0, 0.0), unit(1.0, 0.01)];
        let labels = dbscan(&vectors, &ClusterParams::default());
        assert!(labels.iter().all(|l| l.is_none()));
    }

    #[test]
    fn test_dbscan_is_deterministic() {
        let vectors: Vec<Vec<f32>> = (0..10)
            .map(|i| unit(1.0, i as f32 * 0.01))
            .collect();
        let params = ClusterParams {
            eps: 0.1,
            min_samples: 3,
        };
        assert_eq!(dbscan(&vectors, &params), dbscan(&vectors, &params));
    }

    #[test]
    fn test_majority_event() {
        let mut referenced = HashMap::new();
        referenced.insert(7, 3usize);
        referenced.insert(9, 1usize);
        assert_eq!(majority_event(&referenced, 5), Some(7));
        assert_eq!(majority_event(&referenced, 6), None);
    }

    #[test]
    fn test_closest_to_centroid() {
        let embeddings = vec![unit(1.0, 0.0), unit(0.0, 1.0), unit(1.0, 1.0)];
        let indices = vec![0, 1, 2];
        // The diagonal vector sits closest to the mean of all three.
        assert_eq!(closest_to_centroid(&embeddings, &indices), 2);
    }
}
