//! Pure state transition function

use super::dispatch::select_flow;
use super::state::{ChatMessage, ConversationState, RouterPhase};
use super::topic::TopicClassification;
use super::{Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Conversation is busy with another turn")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function: no I/O, same inputs always give the same outputs.
pub fn transition(
    state: &ConversationState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state.phase, event) {
        (RouterPhase::Idle, Event::UserTurn { content, timestamp }) => {
            let mut next = state.clone();
            next.messages.push(ChatMessage::user(content.clone(), timestamp));
            next.human_input = Some(content);
            next.ai_reply = None;

            if next.topic.is_some() {
                // Sticky topic: skip the classifier
                let flow = select_flow(next.topic.as_ref());
                next.selected_flow = Some(flow);
                next.phase = RouterPhase::Generating { flow };
                Ok(TransitionResult::new(next).with_effect(Effect::RunGeneration { flow }))
            } else {
                next.selected_flow = None;
                next.phase = RouterPhase::Classifying;
                Ok(TransitionResult::new(next).with_effect(Effect::ClassifyTopic))
            }
        }

        (_, Event::UserTurn { .. }) => Err(TransitionError::Busy),

        (RouterPhase::Classifying, Event::TopicClassified(classification)) => {
            let mut next = state.clone();
            next.topic = Some(apply_classification(state.topic.as_ref(), classification));
            let flow = select_flow(next.topic.as_ref());
            next.selected_flow = Some(flow);
            next.phase = RouterPhase::Generating { flow };
            Ok(TransitionResult::new(next).with_effect(Effect::RunGeneration { flow }))
        }

        (RouterPhase::Classifying, Event::ClassificationFailed { message }) => {
            // The working state is discarded by the executor; the stored
            // conversation stays as it was before the turn.
            let mut next = state.clone();
            next.phase = RouterPhase::Idle;
            Ok(TransitionResult::new(next).with_effect(Effect::AbortTurn { reason: message }))
        }

        (RouterPhase::Generating { .. }, Event::ReplyGenerated(reply)) => {
            let mut next = state.clone();
            next.messages.push(ChatMessage::assistant(&reply));
            next.ai_reply = Some(reply);
            next.phase = RouterPhase::Resetting;
            Ok(TransitionResult::new(next).with_effect(Effect::ResetTopic))
        }

        (RouterPhase::Resetting, Event::TopicReset) => {
            let mut next = reset_topic(state.clone());
            next.phase = RouterPhase::Idle;
            Ok(TransitionResult::new(next)
                .with_effects([Effect::PersistState, Effect::TurnComplete]))
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in phase {}",
            event.name(),
            phase.name()
        ))),
    }
}

/// Sticky-topic rule: an existing topic always wins over a new classification
pub fn apply_classification(
    current: Option<&TopicClassification>,
    incoming: TopicClassification,
) -> TopicClassification {
    match current {
        Some(existing) => existing.clone(),
        None => incoming,
    }
}

/// Clear the sticky topic. Everything else, including the reply, is untouched.
pub fn reset_topic(mut state: ConversationState) -> ConversationState {
    state.topic = None;
    state
}
