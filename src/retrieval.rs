//! Knowledge-base retrieval
//!
//! [`KnowledgeBase`] is the capability flows depend on. The production
//! backend is [`HybridRetrievalEngine`], assembled from an embedding
//! provider, a vector index, a reranker and per-topic sparse vectorizers.

mod engine;
mod http;
pub mod sparse;
mod types;

#[cfg(test)]
pub mod testing;

#[allow(unused_imports)] // Public API re-exports
pub use engine::{
    rank_candidates, HybridRetrievalEngine, UnavailableKnowledgeBase, DEFAULT_RETRIEVE_K,
    DEFAULT_TIMEOUT, DEFAULT_TOP_K,
};
pub use http::{HttpEmbeddingProvider, HttpReranker, PineconeIndex};
#[allow(unused_imports)]
pub use sparse::{SparseVectorizerRegistry, TfidfVectorizer, SPARSE_TOPICS};
#[allow(unused_imports)]
pub use types::{IndexCandidate, IndexQuery, RetrievalError, RetrievalMatch, SparseVector};

use async_trait::async_trait;
use std::sync::Arc;

/// Maps text to a dense vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// Stage-one search over dense and sparse vectors
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, query: &IndexQuery) -> Result<Vec<IndexCandidate>, RetrievalError>;

    fn is_healthy(&self) -> bool;
}

/// Cross-encoder relevance scoring
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per document, in the same order as `documents`
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RetrievalError>;
}

/// What a flow needs from retrieval. Callers check `is_healthy` first and
/// treat an unhealthy knowledge base as "no context available".
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// At most `k` matches, best first. Failures yield an empty result.
    async fn query(&self, text: &str, topic: &str, k: usize) -> Vec<RetrievalMatch>;

    fn is_healthy(&self) -> bool;
}

#[async_trait]
impl<T: KnowledgeBase + ?Sized> KnowledgeBase for Arc<T> {
    async fn query(&self, text: &str, topic: &str, k: usize) -> Vec<RetrievalMatch> {
        (**self).query(text, topic, k).await
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}
