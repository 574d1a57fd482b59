//! Events that drive the routing state machine

use super::state::AiReply;
use super::topic::TopicClassification;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new user message for this thread
    UserTurn { content: String, timestamp: String },

    /// The classifier produced an intent
    TopicClassified(TopicClassification),

    /// The classification call failed; the turn cannot proceed
    ClassificationFailed { message: String },

    /// The flow's generation step produced the assistant turn
    ReplyGenerated(AiReply),

    /// The sticky topic was cleared
    TopicReset,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserTurn { .. } => "user_turn",
            Event::TopicClassified(_) => "topic_classified",
            Event::ClassificationFailed { .. } => "classification_failed",
            Event::ReplyGenerated(_) => "reply_generated",
            Event::TopicReset => "topic_reset",
        }
    }
}
