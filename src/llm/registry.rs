//! Model registry for managing available completion providers

use super::{all_models, LlmService, LoggingService, ModelDef, Provider};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const PREFERRED_DEFAULT: &str = "llama-3.3-70b";

/// Configuration for completion providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            groq_api_key: non_empty_env("GROQ_API_KEY"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            default_model: non_empty_env("DEFAULT_MODEL"),
        }
    }

    fn key_for(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::Groq => self.groq_api_key.as_ref(),
            Provider::OpenAI => self.openai_api_key.as_ref(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Registry of available completion models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    /// Create an empty registry for testing purposes
    #[cfg(test)]
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
            default_model: "test-model".to_string(),
        }
    }

    /// Build a registry with every model whose provider key is configured.
    /// Every service is wrapped in [`LoggingService`] with the given deadline.
    pub fn new(config: &LlmConfig, timeout: Duration) -> Self {
        let client = Client::new();
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config, &client) {
                services.insert(
                    model_def.id.to_string(),
                    Arc::new(LoggingService::new(service, timeout)),
                );
            }
        }

        let default_model = config
            .default_model
            .clone()
            .filter(|id| services.contains_key(id))
            .or_else(|| {
                all_models()
                    .iter()
                    .map(|m| m.id)
                    .find(|id| services.contains_key(*id))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| PREFERRED_DEFAULT.to_string());

        Self {
            services,
            default_model,
        }
    }

    fn try_create_model(
        model_def: &ModelDef,
        config: &LlmConfig,
        client: &Client,
    ) -> Option<Arc<dyn LlmService>> {
        let api_key = config.key_for(model_def.provider)?;
        match model_def.create(client.clone(), api_key) {
            Ok(service) => Some(service),
            Err(e) => {
                tracing::warn!(model = model_def.id, error = %e, "Skipping model");
                None
            }
        }
    }

    /// Register a service under its own model id
    #[cfg(test)]
    pub fn insert(&mut self, service: Arc<dyn LlmService>) {
        self.services.insert(service.model_id().to_string(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the requested model, falling back to the default one
    pub fn resolve(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.get(model_id).or_else(|| self.default())
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    /// Get a cheap/fast model for auxiliary tasks like title generation.
    /// Falls back to the default model if no cheap model is configured.
    pub fn get_cheap_model(&self) -> Option<Arc<dyn LlmService>> {
        all_models()
            .iter()
            .filter(|m| m.cheap)
            .find_map(|m| self.get(m.id))
            .or_else(|| self.default())
    }
}
