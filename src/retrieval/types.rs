//! Retrieval data types

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// One scored, attributed passage returned by the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalMatch {
    pub content: String,
    /// Rerank score, never negative
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl RetrievalMatch {
    pub fn new(content: impl Into<String>, score: f32, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            score,
            metadata,
        }
    }

    /// `metadata.source`, or `Unknown`
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }
}

/// Term-weighted vector; indices strictly ascending
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Stage-one request against the vector index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub top_k: usize,
    /// Restricts the search to documents tagged with this topic
    pub topic: String,
}

/// Stage-one hit, in index rank order
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCandidate {
    pub id: String,
    pub score: f32,
    /// The passage text (`metadata.page_content`)
    pub text: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Embedding failed: {0}")]
    Embedding(String),
    #[error("Index query failed: {0}")]
    Index(String),
    #[error("Rerank failed: {0}")]
    Rerank(String),
    #[error("Sparse vectorizer error: {0}")]
    Sparse(String),
    #[error("Retrieval timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
