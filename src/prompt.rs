//! Prompt assembly
//!
//! Pure formatting: nothing here performs retrieval or generation.

pub mod persona;

use crate::retrieval::RetrievalMatch;
use crate::state_machine::{ChatMessage, Role};
use regex::Regex;
use std::borrow::Cow;
use std::fmt::Write;
use std::sync::LazyLock;

pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 2000;

/// Appended to retrieved context that was cut at the length limit
pub const TRUNCATION_MARKER: &str = "...";

const INSTRUCTIONS: &str = "\
1. Use ONLY the provided context to answer the question
2. If the context doesn't contain relevant information, admit that you don't know
3. Format the answer clearly with bullet points when appropriate
4. Be concise but thorough
5. Match the language of the question (Vietnamese/English)
6. Keep numerical values and specific details exactly as found in the context";

static THINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid think-tag pattern"));

/// Instruction sections of a prompt. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemPrompts {
    pub role: String,
    pub skills: String,
    pub tone: String,
    pub tasks: String,
    pub examples: String,
    pub constraints: String,
    pub important_information: String,
}

impl SystemPrompts {
    fn sections(&self) -> [(&'static str, &str); 7] {
        [
            ("Role", &self.role),
            ("Skills", &self.skills),
            ("Tone", &self.tone),
            ("Tasks", &self.tasks),
            ("Examples", &self.examples),
            ("Constraints", &self.constraints),
            ("Important Information", &self.important_information),
        ]
    }
}

/// Build the retrieval-augmented prompt.
///
/// `retrieved_context` is cut to `max_context_length` characters (not bytes,
/// and without regard for word boundaries) followed by [`TRUNCATION_MARKER`].
pub fn format_prompt(
    user_input: &str,
    retrieved_context: &str,
    chat_history: &str,
    system_prompts: &SystemPrompts,
    max_context_length: usize,
) -> String {
    let mut prompt = String::new();
    for (title, body) in system_prompts.sections() {
        push_section(&mut prompt, title, body);
    }

    let context = truncate_context(retrieved_context, max_context_length);
    push_section(&mut prompt, "Context from Knowledge Base:", &context);
    push_section(&mut prompt, "Previous Conversation:", chat_history);
    push_section(&mut prompt, "Current Question:", user_input);
    push_section(&mut prompt, "Instructions:", INSTRUCTIONS);
    prompt.push_str("Answer:");
    prompt
}

/// Prompt for flows answered without retrieval. Empty sections are omitted.
pub fn format_direct_prompt(
    system_prompts: &SystemPrompts,
    chat_history: &str,
    user_input: &str,
) -> String {
    let mut prompt = String::new();
    for (title, body) in system_prompts.sections() {
        if !body.trim().is_empty() {
            push_section(&mut prompt, title, body);
        }
    }
    let _ = write!(
        prompt,
        "Chat History:\n```\n{chat_history}\n```\n\nUser's input: {user_input}\nAnswer:"
    );
    prompt
}

fn push_section(prompt: &mut String, title: &str, body: &str) {
    let _ = write!(prompt, "# {title}\n{}\n\n", body.trim());
}

pub fn truncate_context(context: &str, max_chars: usize) -> Cow<'_, str> {
    match context.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.extend(context.chars().take(max_chars));
            truncated.push_str(TRUNCATION_MARKER);
            Cow::Owned(truncated)
        }
        None => Cow::Borrowed(context),
    }
}

/// Source citation lines, one per match: `- {source} (relevance: {score:.2f})`
pub fn format_sources(matches: &[RetrievalMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("- {} (relevance: {:.2})", m.source(), m.score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize chat turns as `User: ...` / `Assistant: ...` lines
pub fn format_history(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `<think>...</think>` reasoning blocks some models emit
pub fn strip_think_tags(text: &str) -> String {
    THINK_TAG.replace_all(text, "").trim().to_string()
}
