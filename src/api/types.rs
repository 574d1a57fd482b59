//! API request and response types

use crate::db::ThreadSummary;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Absent for the first message of a new thread
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Assistant reply for one turn
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub thread_id: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

/// Request to rename a thread
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub new_title: String,
}

/// Response with the list of threads, most recent first
#[derive(Debug, Serialize)]
pub struct ThreadListResponse {
    pub threads: Vec<ThreadSummary>,
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
