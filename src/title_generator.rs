//! Conversation title generation using a fast/cheap LLM
//!
//! Generates short, meaningful titles based on the first user message.

use crate::llm::{LlmRequest, LlmService};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const TITLE_PROMPT: &str = r#"Generate a very short (3-8 words) title summarizing this question, in the same language as the question. Output only the title, no quotes. Examples:
- "Cho em hỏi học phí ngành Khoa học máy tính năm nay" -> Học phí ngành Khoa học máy tính
- "Điều kiện để bảo lưu kết quả học tập là gì?" -> Điều kiện bảo lưu học tập
- "How do I apply for a master's program?" -> Applying for a master's program

Question:"#;

const TITLE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TITLE_LENGTH: usize = 60;
const FALLBACK_TITLE_LENGTH: usize = 40;
const MAX_PROMPT_MESSAGE_LENGTH: usize = 500;

/// Title for a new thread: generated when a model is available and answers
/// in time, otherwise derived from the message itself.
pub async fn title_for(message_text: &str, llm_service: Option<Arc<dyn LlmService>>) -> String {
    let generated = match llm_service {
        Some(llm) => generate_title(message_text, llm).await,
        None => None,
    };
    generated.unwrap_or_else(|| fallback_title(message_text))
}

/// Generate a title for a conversation based on the initial message.
///
/// Returns None if title generation fails (timeout, error, empty output).
pub async fn generate_title(
    message_text: &str,
    llm_service: Arc<dyn LlmService>,
) -> Option<String> {
    let truncated = truncate_chars(message_text.trim(), MAX_PROMPT_MESSAGE_LENGTH);
    let prompt = format!("{TITLE_PROMPT}\n{truncated}");

    let request = LlmRequest::user_prompt(llm_service.model_id(), prompt)
        .with_temperature(0.2)
        .with_max_tokens(30);

    match timeout(TITLE_TIMEOUT, llm_service.complete(&request)).await {
        Ok(Ok(response)) => Some(sanitize_title(&response.content)).filter(|t| !t.is_empty()),
        Ok(Err(e)) => {
            tracing::warn!(kind = ?e.kind, "Title generation LLM error: {}", e.message);
            None
        }
        Err(_) => {
            tracing::warn!("Title generation timed out");
            None
        }
    }
}

/// First characters of the message, with `...` when it was cut
pub fn fallback_title(message_text: &str) -> String {
    let collapsed = collapse_whitespace(message_text);
    if collapsed.chars().count() > FALLBACK_TITLE_LENGTH {
        format!("{}...", truncate_chars(&collapsed, FALLBACK_TITLE_LENGTH))
    } else {
        collapsed
    }
}

/// Sanitize a model-produced title:
/// - drop think markup and quote characters
/// - collapse whitespace and trailing punctuation
/// - cut at a word boundary within the length limit
fn sanitize_title(title: &str) -> String {
    let stripped = crate::prompt::strip_think_tags(title);
    let first_line = stripped.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let cleaned: String = first_line
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`' | '“' | '”' | '‘' | '’' | '«' | '»'))
        .collect();
    let cleaned = collapse_whitespace(&cleaned);
    let cleaned = cleaned.trim_end_matches(['.', ':', ';']).trim_end();

    if cleaned.chars().count() <= MAX_TITLE_LENGTH {
        return cleaned.to_string();
    }
    let truncated = truncate_chars(cleaned, MAX_TITLE_LENGTH);
    match truncated.rfind(' ') {
        Some(last_space) if last_space > 0 => truncated
            .get(..last_space)
            .unwrap_or(&truncated)
            .to_string(),
        _ => truncated,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse};
    use async_trait::async_trait;

    struct Fixed(Result<&'static str, ()>, Duration);

    #[async_trait]
    impl LlmService for Fixed {
        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(self.1).await;
            self.0
                .map(LlmResponse::text)
                .map_err(|()| LlmError::server_error("boom"))
        }

        fn model_id(&self) -> &str {
            "cheap"
        }
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("\"Học phí ngành Điện tử\""), "Học phí ngành Điện tử");
        assert_eq!(sanitize_title("  Multiple   Spaces.  "), "Multiple Spaces");
        assert_eq!(
            sanitize_title("<think>x</think>\n“Bảo lưu học tập”\nextra"),
            "Bảo lưu học tập"
        );
    }

    #[test]
    fn test_sanitize_title_truncation() {
        let long_title = "Thông tin chi tiết về học phí và học bổng của chương trình tiên tiến năm học mới";
        let result = sanitize_title(long_title);
        assert!(result.chars().count() <= MAX_TITLE_LENGTH);
        assert!(long_title.starts_with(&result));
        assert!(!result.ends_with(' '));
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(fallback_title("Học phí?"), "Học phí?");
        let long = "Cho em hỏi điều kiện xét tuyển thẳng vào ngành Khoa học máy tính năm nay";
        let title = fallback_title(long);
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), FALLBACK_TITLE_LENGTH + 3);
    }

    #[tokio::test]
    async fn test_title_for_uses_model() {
        let llm: Arc<dyn LlmService> = Arc::new(Fixed(Ok("Học phí KHMT"), Duration::ZERO));
        assert_eq!(title_for("Học phí ngành KHMT?", Some(llm)).await, "Học phí KHMT");
    }

    #[tokio::test]
    async fn test_title_for_falls_back() {
        let failing: Arc<dyn LlmService> = Arc::new(Fixed(Err(()), Duration::ZERO));
        assert_eq!(title_for("Xin chào", Some(failing)).await, "Xin chào");
        assert_eq!(title_for("Xin chào", None).await, "Xin chào");

        let blank: Arc<dyn LlmService> = Arc::new(Fixed(Ok("  \"\"  "), Duration::ZERO));
        assert_eq!(title_for("Xin chào", Some(blank)).await, "Xin chào");
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_generation_times_out() {
        let slow: Arc<dyn LlmService> = Arc::new(Fixed(Ok("late"), Duration::from_secs(30)));
        assert!(generate_title("Xin chào", slow).await.is_none());
    }
}
