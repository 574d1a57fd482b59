//! Conversation routing state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! classify the first turn, dispatch to a flow, generate, reset the topic.

pub mod dispatch;
mod effect;
pub mod event;
pub mod state;
pub mod topic;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

#[cfg(test)]
pub use dispatch::select_flow_by_name;
pub use dispatch::Flow;
pub use effect::Effect;
pub use event::Event;
pub use state::{now_timestamp, AiReply, ChatMessage, ConversationState, Role};
pub use topic::{RawClassification, Topic, TopicClassification};
pub use transition::{transition, TransitionError};
#[allow(unused_imports)] // Public API re-exports
pub use {
    dispatch::{dispatch, select_flow},
    state::RouterPhase,
    topic::CONFIDENCE_FLOOR,
    transition::reset_topic,
};
