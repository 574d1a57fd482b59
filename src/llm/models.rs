//! Centralized model definitions
//!
//! Both providers speak the OpenAI-compatible chat protocol, so a model is
//! just an id, the provider's API name, and an endpoint.

use super::openai::{GROQ_CHAT_URL, OPENAI_CHAT_URL};
use super::{LlmService, OpenAIService};
use reqwest::Client;
use std::sync::Arc;

/// Completion provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Groq,
    OpenAI,
}

impl Provider {
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn chat_url(self) -> &'static str {
        match self {
            Provider::Groq => GROQ_CHAT_URL,
            Provider::OpenAI => OPENAI_CHAT_URL,
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "llama-3.3-70b")
    pub id: &'static str,
    pub provider: Provider,
    /// API name used by the provider (e.g., "llama-3.3-70b-versatile")
    pub api_name: &'static str,
    pub description: &'static str,
    /// Suitable for auxiliary work like title generation
    pub cheap: bool,
}

impl ModelDef {
    pub fn create(&self, client: Client, api_key: &str) -> Result<Arc<dyn LlmService>, String> {
        if api_key.is_empty() {
            return Err(format!(
                "{} requires {}",
                self.id,
                self.provider.api_key_env_var()
            ));
        }
        Ok(Arc::new(OpenAIService::new(
            client,
            api_key.to_string(),
            self.id,
            self.api_name,
            self.provider.chat_url(),
        )))
    }
}

/// Get all available model definitions, in order of preference
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "llama-3.3-70b",
            provider: Provider::Groq,
            api_name: "llama-3.3-70b-versatile",
            description: "Llama 3.3 70B on Groq (default)",
            cheap: false,
        },
        ModelDef {
            id: "llama-3.1-8b",
            provider: Provider::Groq,
            api_name: "llama-3.1-8b-instant",
            description: "Llama 3.1 8B on Groq (fast, cheap)",
            cheap: true,
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            api_name: "gpt-4o-mini",
            description: "GPT-4o mini (fast, cheap)",
            cheap: true,
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            api_name: "gpt-4o",
            description: "GPT-4o (balanced)",
            cheap: false,
        },
    ]
}
