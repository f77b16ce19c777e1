use crate::error::CollaboratorFailure;
use crate::models::RetrievedPassage;
use crate::traits::{Embedder, VectorIndex};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum similarity for a passage to count as relevant. Narrative prose
    /// tolerates lower similarity than factual lookups, so tune per corpus.
    pub score_threshold: f32,
    pub timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.6,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Thresholded nearest-neighbour lookup over a [`VectorIndex`].
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    timeout: Duration,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, timeout: Duration) -> Self {
        Self { index, timeout }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embeds `query` and looks it up. One deadline covers both calls.
    ///
    /// Passages have `score >= score_threshold`, best first, at most `k`.
    /// Equal scores keep the order the index returned them in. Errors and
    /// timeouts are returned as-is; retrying is up to the caller.
    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<Retrieval, CollaboratorFailure> {
        let lookup = async {
            let query_embedding = embedder.embed(query).await?;
            let hits = if k == 0 {
                Vec::new()
            } else {
                self.index.query(&query_embedding, k).await?
            };
            Ok::<_, CollaboratorFailure>((query_embedding, hits))
        };
        let (query_embedding, hits) = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| CollaboratorFailure::Timeout(self.timeout))??;
        let returned = hits.len();

        let passages = rank_passages(hits, k, score_threshold);
        debug!(returned, kept = passages.len(), score_threshold, "retrieval filtered");
        Ok(Retrieval {
            query_embedding,
            passages,
        })
    }
}

/// What one lookup produced, with the query vector kept for scoring.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub query_embedding: Vec<f32>,
    pub passages: Vec<RetrievedPassage>,
}

pub(crate) fn rank_passages(
    hits: Vec<(crate::Chunk, f32)>,
    k: usize,
    score_threshold: f32,
) -> Vec<RetrievedPassage> {
    let mut passages: Vec<RetrievedPassage> = hits
        .into_iter()
        .filter(|(_, score)| score.is_finite() && *score >= score_threshold)
        .map(|(chunk, score)| RetrievedPassage {
            chunk,
            score: score.clamp(0.0, 1.0),
        })
        .collect();

    // sort_by is stable, so ties keep index order
    passages.sort_by(|left, right| right.score.total_cmp(&left.score));
    passages.truncate(k);
    passages
}
