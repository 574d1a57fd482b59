//! HTTP-backed retrieval providers
//!
//! - embeddings: OpenAI-compatible `/embeddings`
//! - vector index: Pinecone data plane `POST {host}/query`
//! - reranker: text-embeddings-inference `/rerank`

use super::types::{IndexCandidate, IndexQuery, RetrievalError};
use super::{EmbeddingProvider, Reranker, VectorIndex};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const PINECONE_API_VERSION: &str = "2024-07";

/// Send a request and decode a JSON body, mapping every failure through `wrap`
async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    wrap: fn(String) -> RetrievalError,
) -> Result<T, RetrievalError> {
    let response = request
        .send()
        .await
        .map_err(|e| wrap(format!("Request failed: {e}")))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| wrap(format!("Failed to read response: {e}")))?;
    if !status.is_success() {
        return Err(wrap(format!("HTTP {status}: {body}")));
    }
    serde_json::from_str(&body).map_err(|e| wrap(format!("Failed to parse response: {e}")))
}

// ============================================================================
// Embeddings
// ============================================================================

pub struct HttpEmbeddingProvider {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingProvider {
    pub fn new(client: Client, url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            model,
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut request = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.model,
            input: [text],
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: EmbeddingResponse = send_json(request, RetrievalError::Embedding).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RetrievalError::Embedding("Empty embedding response".to_string()))
    }
}

// ============================================================================
// Vector index
// ============================================================================

pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
}

impl PineconeIndex {
    pub fn new(client: Client, host: &str, api_key: String) -> Self {
        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        Self {
            client,
            host,
            api_key,
        }
    }

    fn request_body(query: &IndexQuery) -> Value {
        let mut body = json!({
            "vector": query.dense,
            "topK": query.top_k,
            "filter": { "topic": { "$eq": query.topic } },
            "includeMetadata": true,
        });
        if let Some(sparse) = query.sparse.as_ref().filter(|s| !s.is_empty()) {
            body["sparseVector"] = json!(sparse);
        }
        body
    }

    fn into_candidates(response: PineconeQueryResponse) -> Vec<IndexCandidate> {
        response
            .matches
            .into_iter()
            .filter_map(|m| {
                let text = m
                    .metadata
                    .get("page_content")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match text {
                    Some(text) => Some(IndexCandidate {
                        id: m.id,
                        score: m.score,
                        text,
                        metadata: m.metadata,
                    }),
                    None => {
                        tracing::warn!(id = %m.id, "Dropping match without page_content");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, query: &IndexQuery) -> Result<Vec<IndexCandidate>, RetrievalError> {
        let request = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(&Self::request_body(query));

        let response: PineconeQueryResponse = send_json(request, RetrievalError::Index).await?;
        Ok(Self::into_candidates(response))
    }

    fn is_healthy(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// Reranker
// ============================================================================

pub struct HttpReranker {
    client: Client,
    url: String,
}

impl HttpReranker {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }

    /// Put `[{index, score}]` back into document order
    fn scores_in_order(ranked: &[RerankScore], count: usize) -> Result<Vec<f32>, RetrievalError> {
        let mut scores: Vec<Option<f32>> = vec![None; count];
        for entry in ranked {
            let slot = scores.get_mut(entry.index).ok_or_else(|| {
                RetrievalError::Rerank(format!("Score index {} out of range", entry.index))
            })?;
            *slot = Some(entry.score);
        }
        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                s.ok_or_else(|| RetrievalError::Rerank(format!("No score for document {i}")))
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RetrievalError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let request = self.client.post(&self.url).json(&RerankRequest {
            query,
            texts: documents,
            raw_scores: false,
        });
        let ranked: Vec<RerankScore> = send_json(request, RetrievalError::Rerank).await?;
        Self::scores_in_order(&ranked, documents.len())
    }
}
