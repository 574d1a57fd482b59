//! Topic flows
//!
//! Each intent has one flow with a single generation step. Retrieval-backed
//! flows ground the answer in the knowledge base; the others answer from the
//! persona alone. Every failure inside a flow degrades to a canned reply.

mod catalog;
mod generation;

#[allow(unused_imports)] // Public API re-exports
pub use catalog::{
    profile, FlowProfile, APOLOGY_REPLY, GENERATION_FAILURE_REPLY, GOODBYE_FALLBACK_REPLY,
    GREETING_FALLBACK_REPLY, NO_CONTEXT, OFF_TOPIC_FALLBACK_REPLY, RETRIEVAL_UNAVAILABLE_REPLY,
};
pub use generation::FlowRunner;
