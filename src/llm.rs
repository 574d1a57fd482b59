//! Completion provider abstraction
//!
//! Every node that talks to a language model goes through [`LlmService`].
//! Concrete providers speak the OpenAI-compatible chat completions protocol.

mod error;
mod models;
mod openai;
mod registry;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use models::{all_models, ModelDef, Provider};
pub use openai::OpenAIService;
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Common interface for completion providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging and deadline wrapper for completion providers
///
/// Each call is bounded by `timeout`; an elapsed deadline becomes
/// [`LlmErrorKind::Timeout`] so callers fall back exactly as they would for
/// any other provider failure.
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
    timeout: Duration,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>, timeout: Duration) -> Self {
        let model_id = inner.model_id().to_string();
        Self {
            inner,
            model_id,
            timeout,
        }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.inner.complete(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::timeout(self.timeout)),
        };
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Completion failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowService;

    #[async_trait]
    impl LlmService for SlowService {
        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(LlmResponse::text("late"))
        }

        fn model_id(&self) -> &str {
            "slow"
        }
    }

    struct EchoService;

    #[async_trait]
    impl LlmService for EchoService {
        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse::text(request.last_user_text().unwrap_or_default()))
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_logging_service_times_out() {
        let service = LoggingService::new(Arc::new(SlowService), Duration::from_millis(20));
        let err = service
            .complete(&LlmRequest::user_prompt("slow", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_logging_service_passes_through() {
        let service = LoggingService::new(Arc::new(EchoService), Duration::from_secs(1));
        assert_eq!(service.model_id(), "echo");
        let response = service
            .complete(&LlmRequest::user_prompt("echo", "xin chào"))
            .await
            .unwrap();
        assert_eq!(response.content, "xin chào");
    }
}
