//! Conversation state types

use super::dispatch::Flow;
use super::topic::TopicClassification;
use serde::{Deserialize, Serialize};

/// Timestamp format used for every stored turn
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`]
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Who said a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" | "ai" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: timestamp.into(),
            sources: None,
        }
    }

    pub fn assistant(reply: &AiReply) -> Self {
        Self {
            role: Role::Assistant,
            content: reply.content.clone(),
            timestamp: reply.timestamp.clone(),
            sources: reply.sources.clone(),
        }
    }
}

/// The assistant turn produced by a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiReply {
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

/// Where the router is within one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouterPhase {
    /// Waiting for a user turn
    #[default]
    Idle,
    /// The topic classifier is running
    Classifying,
    /// The selected flow's generation step is running
    Generating { flow: Flow },
    /// Generation finished; the sticky topic is about to be cleared
    Resetting,
}

impl RouterPhase {
    pub fn name(self) -> &'static str {
        match self {
            RouterPhase::Idle => "idle",
            RouterPhase::Classifying => "classifying",
            RouterPhase::Generating { .. } => "generating",
            RouterPhase::Resetting => "resetting",
        }
    }
}

/// Everything threaded through one invocation of the router
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    /// Ordered turns; append-only within an invocation
    pub messages: Vec<ChatMessage>,
    /// Sticky intent. Written only by classification and topic reset.
    pub topic: Option<TopicClassification>,
    /// Recomputed from `topic` on every invocation
    pub selected_flow: Option<Flow>,
    pub human_input: Option<String>,
    pub ai_reply: Option<AiReply>,
    pub phase: RouterPhase,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted history; transient fields start empty
    pub fn from_history(
        messages: Vec<ChatMessage>,
        topic: Option<TopicClassification>,
    ) -> Self {
        Self {
            messages,
            topic,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == RouterPhase::Idle
    }

    /// Turns before the current user input
    pub fn history(&self) -> &[ChatMessage] {
        match self.messages.split_last() {
            Some((last, rest)) if last.role == Role::User => rest,
            _ => &self.messages,
        }
    }
}
