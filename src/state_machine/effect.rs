//! Effects produced by state transitions

use super::dispatch::Flow;

/// Side effects the executor carries out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the topic classifier on the current state
    ClassifyTopic,

    /// Run the generation step of a flow
    RunGeneration { flow: Flow },

    /// Run the flow's reset step
    ResetTopic,

    /// Persist the conversation
    PersistState,

    /// Give up on this turn without persisting anything
    AbortTurn { reason: String },

    /// The invocation is finished
    TurnComplete,
}
