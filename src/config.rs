//! Environment configuration
//!
//! Read once at startup. Every reader takes a lookup function so tests can
//! supply variables without touching the process environment.

use crate::llm::LlmConfig;
use crate::retrieval::{DEFAULT_RETRIEVE_K, DEFAULT_TIMEOUT, DEFAULT_TOP_K};
use crate::state_machine::Flow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:8081/v1/embeddings";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_RERANK_URL: &str = "http://127.0.0.1:8080/rerank";
pub const DEFAULT_SPARSE_MODEL_DIR: &str = "tfidf_models";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BK_DB_PATH is not set and HOME is unavailable")]
    NoDatabasePath,
}

/// Non-empty value of a variable
fn get(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Parse a variable, warning and falling back to `default` on bad input
fn parse_or<T: FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    valid: impl Fn(T) -> bool,
) -> T {
    let Some(raw) = get(lookup, name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(value) => value,
        _ => {
            tracing::warn!(variable = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

fn secs_or(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_or(lookup, name, default.as_secs(), |s| s > 0))
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub llm: LlmConfig,
    pub completion_timeout: Duration,
    pub retrieval: RetrievalSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = match get(&lookup, "BK_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = get(&lookup, "HOME").ok_or(ConfigError::NoDatabasePath)?;
                PathBuf::from(home).join(".bk-assistant").join("threads.db")
            }
        };

        Ok(Self {
            port: parse_or(&lookup, "BK_PORT", DEFAULT_PORT, |p| p > 0),
            db_path,
            llm: LlmConfig {
                groq_api_key: get(&lookup, "GROQ_API_KEY"),
                openai_api_key: get(&lookup, "OPENAI_API_KEY"),
                default_model: get(&lookup, "DEFAULT_MODEL"),
            },
            completion_timeout: secs_or(
                &lookup,
                "COMPLETION_TIMEOUT_SECS",
                DEFAULT_COMPLETION_TIMEOUT,
            ),
            retrieval: RetrievalSettings::from_lookup(&lookup),
        })
    }
}

/// Knowledge-base providers and query sizing
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub pinecone_api_key: Option<String>,
    pub pinecone_host: Option<String>,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub rerank_url: String,
    pub sparse_model_dir: PathBuf,
    /// Matches handed to a flow
    pub top_k: usize,
    /// Stage-one candidates sent to the reranker
    pub retrieve_k: usize,
    pub timeout: Duration,
}

impl RetrievalSettings {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let top_k = parse_or(lookup, "RETRIEVAL_TOP_K", DEFAULT_TOP_K, |k| k > 0);
        let mut retrieve_k = parse_or(lookup, "RETRIEVAL_CANDIDATES", DEFAULT_RETRIEVE_K, |k| k > 0);
        if retrieve_k < top_k {
            tracing::warn!(top_k, retrieve_k, "RETRIEVAL_CANDIDATES below RETRIEVAL_TOP_K, raising it");
            retrieve_k = top_k;
        }

        Self {
            pinecone_api_key: get(lookup, "PINECONE_API_KEY"),
            pinecone_host: get(lookup, "PINECONE_INDEX_HOST"),
            embedding_url: get(lookup, "EMBEDDING_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
            embedding_model: get(lookup, "EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_api_key: get(lookup, "EMBEDDING_API_KEY"),
            rerank_url: get(lookup, "RERANK_URL").unwrap_or_else(|| DEFAULT_RERANK_URL.to_string()),
            sparse_model_dir: PathBuf::from(
                get(lookup, "SPARSE_MODEL_DIR")
                    .unwrap_or_else(|| DEFAULT_SPARSE_MODEL_DIR.to_string()),
            ),
            top_k,
            retrieve_k,
            timeout: secs_or(lookup, "RETRIEVAL_TIMEOUT_SECS", DEFAULT_TIMEOUT),
        }
    }

    /// Index credentials and host, when both are configured
    pub fn index(&self) -> Option<(&str, &str)> {
        Some((self.pinecone_host.as_deref()?, self.pinecone_api_key.as_deref()?))
    }
}

/// Which completion model each component uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssignments {
    pub router: String,
    pub generation: String,
    overrides: HashMap<Flow, String>,
}

impl ModelAssignments {
    /// Every component on one model
    pub fn uniform(model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        Self {
            router: model_id.clone(),
            generation: model_id,
            overrides: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_override(mut self, flow: Flow, model_id: impl Into<String>) -> Self {
        self.overrides.insert(flow, model_id.into());
        self
    }

    pub fn from_env(default_model: &str) -> Self {
        Self::from_lookup(default_model, |name| std::env::var(name).ok())
    }

    /// `ROUTER_MODEL`, `GENERATION_MODEL` and `FLOW_MODEL_<FLOW>`, each
    /// falling back to `default_model`
    pub fn from_lookup(default_model: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut assignments = Self {
            router: get(&lookup, "ROUTER_MODEL").unwrap_or_else(|| default_model.to_string()),
            generation: get(&lookup, "GENERATION_MODEL")
                .unwrap_or_else(|| default_model.to_string()),
            overrides: HashMap::new(),
        };
        for flow in Flow::ALL {
            if let Some(model) = get(&lookup, &format!("FLOW_MODEL_{}", flow.env_key())) {
                assignments.overrides.insert(flow, model);
            }
        }
        assignments
    }

    pub fn for_flow(&self, flow: Flow) -> &str {
        self.overrides.get(&flow).unwrap_or(&self.generation)
    }
}
