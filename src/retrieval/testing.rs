//! Fake retrieval providers for tests

use super::types::{IndexCandidate, IndexQuery, RetrievalError, RetrievalMatch};
use super::{EmbeddingProvider, KnowledgeBase, Reranker, VectorIndex};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Index candidate whose text is also its id and source
pub fn candidate(text: &str) -> IndexCandidate {
    let mut metadata = Map::new();
    metadata.insert("page_content".to_string(), json!(text));
    metadata.insert("source".to_string(), json!(format!("{text}.pdf")));
    IndexCandidate {
        id: text.to_string(),
        score: 0.5,
        text: text.to_string(),
        metadata,
    }
}

pub struct FakeEmbedder;

impl FakeEmbedder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    #[allow(clippy::cast_precision_loss)]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(vec![text.len() as f32, 1.0, 0.0])
    }
}

#[derive(Default)]
struct IndexInner {
    candidates: Vec<IndexCandidate>,
    queries: Mutex<Vec<IndexQuery>>,
    healthy: bool,
    failing: bool,
    delay: Option<Duration>,
}

/// Vector index returning a fixed candidate list and recording queries
#[derive(Clone)]
pub struct FakeIndex {
    inner: Arc<IndexInner>,
}

impl FakeIndex {
    pub fn with_candidates(candidates: Vec<IndexCandidate>) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                candidates,
                healthy: true,
                ..Default::default()
            }),
        }
    }

    pub fn failing() -> Self {
        Self {
            inner: Arc::new(IndexInner {
                healthy: true,
                failing: true,
                ..Default::default()
            }),
        }
    }

    fn rebuild(self, f: impl FnOnce(&mut IndexInner)) -> Self {
        let mut inner = IndexInner {
            candidates: self.inner.candidates.clone(),
            queries: Mutex::new(Vec::new()),
            healthy: self.inner.healthy,
            failing: self.inner.failing,
            delay: self.inner.delay,
        };
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn unhealthy(self) -> Self {
        self.rebuild(|inner| inner.healthy = false)
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.rebuild(|inner| inner.delay = Some(delay))
    }

    pub fn calls(&self) -> usize {
        self.inner.queries.lock().unwrap().len()
    }

    pub fn last_query(&self) -> Option<IndexQuery> {
        self.inner.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VectorIndex for FakeIndex {
    async fn query(&self, query: &IndexQuery) -> Result<Vec<IndexCandidate>, RetrievalError> {
        self.inner.queries.lock().unwrap().push(query.clone());
        if let Some(delay) = self.inner.delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.failing {
            return Err(RetrievalError::Index("index down".to_string()));
        }
        Ok(self
            .inner
            .candidates
            .iter()
            .take(query.top_k)
            .cloned()
            .collect())
    }

    fn is_healthy(&self) -> bool {
        self.inner.healthy
    }
}

type ScoreFn = dyn Fn(&[String]) -> Vec<f32> + Send + Sync;

/// Reranker computing scores with a closure and counting calls
#[derive(Clone)]
pub struct FakeReranker {
    score_fn: Arc<ScoreFn>,
    calls: Arc<AtomicUsize>,
}

impl FakeReranker {
    pub fn from_fn(f: impl Fn(&[String]) -> Vec<f32> + Send + Sync + 'static) -> Self {
        Self {
            score_fn: Arc::new(f),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn constant(score: f32) -> Self {
        Self::from_fn(move |docs| vec![score; docs.len()])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reranker for FakeReranker {
    async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.score_fn)(documents))
    }
}

/// Knowledge base with canned matches and a health switch
pub struct StaticKnowledgeBase {
    matches: Vec<RetrievalMatch>,
    healthy: bool,
    queries: Mutex<Vec<(String, String, usize)>>,
}

impl StaticKnowledgeBase {
    pub fn new(matches: Vec<RetrievalMatch>) -> Self {
        Self {
            matches,
            healthy: true,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new(Vec::new())
        }
    }

    /// `(text, topic, k)` for every query received
    pub fn queries(&self) -> Vec<(String, String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

/// Match with a `source` in its metadata
pub fn retrieval_match(content: &str, score: f32, source: &str) -> RetrievalMatch {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::String(source.to_string()));
    RetrievalMatch::new(content, score, metadata)
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn query(&self, text: &str, topic: &str, k: usize) -> Vec<RetrievalMatch> {
        self.queries
            .lock()
            .unwrap()
            .push((text.to_string(), topic.to_string(), k));
        self.matches.iter().take(k).cloned().collect()
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}
