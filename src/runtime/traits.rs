//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::Database;
use crate::llm::{LlmError, LlmRequest, LlmResponse, ModelRegistry};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::sync::Arc;

/// Storage for router state, keyed by thread
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state for a thread, or `None` if the thread does not exist yet
    async fn load_state(&self, thread_id: &str) -> Result<Option<ConversationState>, String>;

    /// Persist the state at the end of a completed turn
    async fn save_state(&self, thread_id: &str, state: &ConversationState) -> Result<(), String>;
}

/// Client for making completion requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn load_state(&self, thread_id: &str) -> Result<Option<ConversationState>, String> {
        (**self).load_state(thread_id).await
    }

    async fn save_state(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        (**self).save_state(thread_id, state).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a state store
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StateStore for DatabaseStorage {
    async fn load_state(&self, thread_id: &str) -> Result<Option<ConversationState>, String> {
        self.db.load_state(thread_id).map_err(|e| e.to_string())
    }

    async fn save_state(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        self.db
            .save_state(thread_id, state)
            .map_err(|e| e.to_string())
    }
}

/// Adapter to use ModelRegistry as LlmClient.
///
/// Requests are routed by their `model_id`; an unknown id falls back to the
/// registry default.
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .resolve(&request.model_id)
            .ok_or_else(|| LlmError::network("No completion model available"))?;
        if llm.model_id() != request.model_id {
            tracing::debug!(requested = %request.model_id, using = %llm.model_id(), "Model not available, using default");
        }
        llm.complete(request).await
    }
}
