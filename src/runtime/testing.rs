//! Mock implementations for testing
//!
//! These mocks enable router and flow tests without real I/O.

use super::traits::{LlmClient, StateStore};
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock completion client that returns queued responses in order.
/// An empty queue answers with an error.
#[derive(Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::unknown("No queued response")))
    }
}

// ============================================================================
// In-memory State Store
// ============================================================================

#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<String, ConversationState>>,
    saves: Mutex<usize>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a thread without counting a save
    pub fn insert(&self, thread_id: &str, state: ConversationState) {
        self.states
            .lock()
            .unwrap()
            .insert(thread_id.to_string(), state);
    }

    pub fn remove(&self, thread_id: &str) -> Option<ConversationState> {
        self.states.lock().unwrap().remove(thread_id)
    }

    pub fn get(&self, thread_id: &str) -> Option<ConversationState> {
        self.states.lock().unwrap().get(thread_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_state(&self, thread_id: &str) -> Result<Option<ConversationState>, String> {
        Ok(self.get(thread_id).map(|s| {
            ConversationState::from_history(s.messages, s.topic)
        }))
    }

    async fn save_state(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        *self.saves.lock().unwrap() += 1;
        self.insert(thread_id, state.clone());
        Ok(())
    }
}
