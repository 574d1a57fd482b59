//! Two-stage hybrid retrieval: broad dense+sparse search, then cross-encoder rerank

use super::sparse::SparseVectorizerRegistry;
use super::types::{IndexCandidate, IndexQuery, RetrievalError, RetrievalMatch};
use super::{EmbeddingProvider, KnowledgeBase, Reranker, VectorIndex};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_RETRIEVE_K: usize = 25;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Hybrid retrieval engine. Holds its providers as injected, read-only
/// dependencies; concurrent queries share them without locking.
pub struct HybridRetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    sparse: Arc<SparseVectorizerRegistry>,
    retrieve_k: usize,
    timeout: Duration,
}

impl HybridRetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        sparse: Arc<SparseVectorizerRegistry>,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            sparse,
            retrieve_k: DEFAULT_RETRIEVE_K,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_retrieve_k(mut self, retrieve_k: usize) -> Self {
        self.retrieve_k = retrieve_k;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Query with an explicit candidate count. Never fails: an unhealthy
    /// engine, a provider error, or an elapsed deadline all yield an empty
    /// result.
    pub async fn query_with(
        &self,
        text: &str,
        topic: &str,
        k: usize,
        retrieve_k: usize,
    ) -> Vec<RetrievalMatch> {
        if !self.is_healthy() {
            tracing::warn!(topic, "Vector index unavailable, skipping retrieval");
            return Vec::new();
        }

        let start = Instant::now();
        let outcome = match tokio::time::timeout(
            self.timeout,
            self.run_stages(text, topic, k, retrieve_k),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(RetrievalError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(matches) => {
                tracing::info!(
                    topic,
                    returned = matches.len(),
                    duration_ms = %start.elapsed().as_millis(),
                    "Retrieval finished"
                );
                matches
            }
            Err(e) => {
                tracing::error!(topic, error = %e, "Retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    async fn run_stages(
        &self,
        text: &str,
        topic: &str,
        k: usize,
        retrieve_k: usize,
    ) -> Result<Vec<RetrievalMatch>, RetrievalError> {
        // Stage 1: broad hybrid search
        let dense = self.embedder.embed_query(text).await?;
        let sparse = self.sparse.encode(topic, text);
        if sparse.is_none() {
            tracing::debug!(topic, "No sparse component for query");
        }

        let query = IndexQuery {
            dense,
            sparse,
            top_k: retrieve_k,
            topic: topic.to_string(),
        };
        let candidates = self.index.query(&query).await?;
        tracing::info!(
            topic,
            candidates = candidates.len(),
            best_score = candidates.first().map(|c| c.score),
            "Stage-one retrieval"
        );
        tracing::debug!(ids = ?candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>());

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Stage 2: precision rerank
        let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self.reranker.score(text, &documents).await?;
        if scores.len() != candidates.len() {
            return Err(RetrievalError::Rerank(format!(
                "Reranker returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }

        let matches = rank_candidates(candidates, &scores, k);
        tracing::debug!(
            topic,
            scores = ?matches.iter().map(|m| m.score).collect::<Vec<_>>(),
            "Reranked matches"
        );
        Ok(matches)
    }
}

#[async_trait]
impl KnowledgeBase for HybridRetrievalEngine {
    async fn query(&self, text: &str, topic: &str, k: usize) -> Vec<RetrievalMatch> {
        self.query_with(text, topic, k, self.retrieve_k).await
    }

    fn is_healthy(&self) -> bool {
        self.index.is_healthy()
    }
}

/// Order candidates by rerank score, highest first, and keep the top `k`.
/// The sort is stable, so equal scores keep their stage-one order.
pub fn rank_candidates(
    candidates: Vec<IndexCandidate>,
    scores: &[f32],
    k: usize,
) -> Vec<RetrievalMatch> {
    let mut scored: Vec<(IndexCandidate, f32)> = candidates
        .into_iter()
        .zip(scores.iter().copied().map(sanitize_score))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(candidate, score)| RetrievalMatch {
            content: candidate.text,
            score,
            metadata: candidate.metadata,
        })
        .collect()
}

/// Non-finite and negative scores become 0
fn sanitize_score(score: f32) -> f32 {
    if score.is_finite() && score > 0.0 {
        score
    } else {
        0.0
    }
}

/// Stand-in used when no vector index is configured
pub struct UnavailableKnowledgeBase;

#[async_trait]
impl KnowledgeBase for UnavailableKnowledgeBase {
    async fn query(&self, _text: &str, topic: &str, _k: usize) -> Vec<RetrievalMatch> {
        tracing::warn!(topic, "Knowledge base not configured");
        Vec::new()
    }

    fn is_healthy(&self) -> bool {
        false
    }
}
