//! Database schema and types

use crate::state_machine::{ChatMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS threads (
    thread_id TEXT PRIMARY KEY,
    title TEXT,
    topic TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_updated ON threads(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    thread_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    sender TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    sources TEXT,

    PRIMARY KEY (thread_id, sequence_id),
    FOREIGN KEY (thread_id) REFERENCES threads(thread_id) ON DELETE CASCADE
);
";

/// Thread listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted turn, in the shape clients read back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

impl StoredMessage {
    pub fn from_chat(message: &ChatMessage) -> Self {
        Self {
            sender: message.role.as_str().to_string(),
            content: message.content.clone(),
            timestamp: message.timestamp.clone(),
            sources: message.sources.clone(),
        }
    }

    /// `None` for a sender this service never writes
    pub fn to_chat(&self) -> Option<ChatMessage> {
        Some(ChatMessage {
            role: Role::parse(&self.sender)?,
            content: self.content.clone(),
            timestamp: self.timestamp.clone(),
            sources: self.sources.clone(),
        })
    }
}

/// Full thread with its messages in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<StoredMessage>,
}
