//! Router executor: drives one invocation through the state machine
//!
//! The executor owns every side effect. It loads the thread, feeds events to
//! the pure [`transition`] function, performs the effects it returns and
//! loops until the turn completes or aborts.

use super::traits::{LlmClient, StateStore};
use crate::classifier::TopicClassifier;
use crate::flows::FlowRunner;
use crate::state_machine::{
    now_timestamp, transition, AiReply, ChatMessage, ConversationState, Effect, Event,
    TransitionError,
};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invocation has no user message")]
    EmptyInput,
    #[error("Topic classification failed: {0}")]
    Classification(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Input for one turn. The last message is the new user turn; any earlier
/// messages are appended to the stored history first.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub messages: Vec<ChatMessage>,
}

impl Invocation {
    pub fn user_turn(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(content, now_timestamp())],
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvocationOutput {
    pub ai_reply: Option<AiReply>,
    /// State as persisted at the end of the turn
    pub state: ConversationState,
}

/// Generic router that can work with any storage and completion client
pub struct ConversationRouter<S, L>
where
    S: StateStore,
    L: LlmClient,
{
    storage: S,
    llm: L,
    classifier: TopicClassifier,
    flows: FlowRunner,
}

impl<S, L> ConversationRouter<S, L>
where
    S: StateStore,
    L: LlmClient,
{
    pub fn new(storage: S, llm: L, classifier: TopicClassifier, flows: FlowRunner) -> Self {
        Self {
            storage,
            llm,
            classifier,
            flows,
        }
    }

    /// Process one user turn to completion.
    ///
    /// On a classification failure nothing is persisted and the stored
    /// conversation is exactly as it was before the call.
    pub async fn invoke(
        &self,
        thread_id: &str,
        invocation: Invocation,
    ) -> Result<InvocationOutput, RouterError> {
        let Some((turn, earlier)) = invocation.messages.split_last() else {
            return Err(RouterError::EmptyInput);
        };
        if turn.content.trim().is_empty() {
            return Err(RouterError::EmptyInput);
        }

        let mut state = self
            .storage
            .load_state(thread_id)
            .await
            .map_err(RouterError::Storage)?
            .unwrap_or_default();
        state.messages.extend(earlier.iter().cloned());

        let timestamp = if turn.timestamp.is_empty() {
            now_timestamp()
        } else {
            turn.timestamp.clone()
        };

        tracing::info!(thread_id, history = state.messages.len(), sticky = state.topic.is_some(), "Processing user turn");

        let mut events = VecDeque::from([Event::UserTurn {
            content: turn.content.clone(),
            timestamp,
        }]);

        while let Some(event) = events.pop_front() {
            let event_name = event.name();
            let result = transition(&state, event)?;
            tracing::debug!(thread_id, event = event_name, phase = result.new_state.phase.name(), "Transition");
            state = result.new_state;

            for effect in result.effects {
                if let Some(next) = self.execute_effect(thread_id, &state, effect).await? {
                    events.push_back(next);
                }
            }
        }

        Ok(InvocationOutput {
            ai_reply: state.ai_reply.clone(),
            state,
        })
    }

    async fn execute_effect(
        &self,
        thread_id: &str,
        state: &ConversationState,
        effect: Effect,
    ) -> Result<Option<Event>, RouterError> {
        match effect {
            Effect::ClassifyTopic => {
                let event = match self.classifier.classify(&self.llm, state).await {
                    Ok(classification) => Event::TopicClassified(classification),
                    Err(e) => {
                        tracing::error!(thread_id, error = %e, "Classification failed");
                        Event::ClassificationFailed {
                            message: e.to_string(),
                        }
                    }
                };
                Ok(Some(event))
            }

            Effect::RunGeneration { flow } => {
                tracing::info!(thread_id, %flow, "Running flow");
                let reply = self.flows.generate(&self.llm, flow, state).await;
                Ok(Some(Event::ReplyGenerated(reply)))
            }

            Effect::ResetTopic => Ok(Some(Event::TopicReset)),

            Effect::PersistState => {
                self.storage
                    .save_state(thread_id, state)
                    .await
                    .map_err(RouterError::Storage)?;
                Ok(None)
            }

            Effect::AbortTurn { reason } => Err(RouterError::Classification(reason)),

            Effect::TurnComplete => {
                tracing::info!(thread_id, messages = state.messages.len(), "Turn complete");
                Ok(None)
            }
        }
    }
}
