//! The generation step shared by every flow

use super::catalog::{profile, FlowProfile, NO_CONTEXT, RETRIEVAL_UNAVAILABLE_REPLY};
use crate::config::ModelAssignments;
use crate::llm::LlmRequest;
use crate::prompt::{
    format_direct_prompt, format_history, format_prompt, format_sources, strip_think_tags,
    DEFAULT_MAX_CONTEXT_LENGTH,
};
use crate::retrieval::{KnowledgeBase, DEFAULT_TOP_K};
use crate::runtime::LlmClient;
use crate::state_machine::{now_timestamp, AiReply, ConversationState, Flow};
use std::sync::Arc;

/// Runs a flow's generation step against the knowledge base and a
/// completion client. Never fails: every error becomes a canned reply.
pub struct FlowRunner {
    knowledge: Arc<dyn KnowledgeBase>,
    models: ModelAssignments,
    top_k: usize,
}

impl FlowRunner {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>, models: ModelAssignments) -> Self {
        Self {
            knowledge,
            models,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn generate<L: LlmClient + ?Sized>(
        &self,
        llm: &L,
        flow: Flow,
        state: &ConversationState,
    ) -> AiReply {
        let profile = profile(flow);
        let user_input = state
            .human_input
            .as_deref()
            .or_else(|| state.messages.last().map(|m| m.content.as_str()))
            .unwrap_or_default();
        let history = format_history(state.history());

        let (prompt, sources) = match profile.retrieval_tag {
            Some(tag) => {
                if !self.knowledge.is_healthy() {
                    tracing::error!(%flow, "Knowledge base unavailable, skipping generation");
                    return reply(RETRIEVAL_UNAVAILABLE_REPLY.to_string(), None);
                }
                self.grounded_prompt(&profile, tag, user_input, &history)
                    .await
            }
            None => (
                format_direct_prompt(&profile.prompts, &history, user_input),
                None,
            ),
        };

        let model_id = self.models.for_flow(flow);
        let request =
            LlmRequest::user_prompt(model_id, prompt).with_temperature(profile.temperature);

        let content = match llm.complete(&request).await {
            Ok(response) => {
                let answer = strip_think_tags(&response.content);
                if answer.is_empty() {
                    tracing::warn!(%flow, model = %model_id, "Empty completion, using fallback reply");
                    None
                } else {
                    Some(answer)
                }
            }
            Err(e) => {
                tracing::error!(%flow, model = %model_id, kind = ?e.kind, error = %e.message, "Generation failed, using fallback reply");
                None
            }
        };

        match content {
            Some(answer) => reply(answer, sources),
            None => reply(profile.failure_reply.to_string(), None),
        }
    }

    /// Retrieve context and build the grounded prompt with its citations
    async fn grounded_prompt(
        &self,
        profile: &FlowProfile,
        tag: &str,
        user_input: &str,
        history: &str,
    ) -> (String, Option<String>) {
        let matches = self.knowledge.query(user_input, tag, self.top_k).await;

        let context = if matches.is_empty() {
            tracing::warn!(flow = %profile.flow, topic = tag, "No relevant context found");
            NO_CONTEXT.to_string()
        } else {
            tracing::info!(
                flow = %profile.flow,
                topic = tag,
                matches = matches.len(),
                scores = ?matches.iter().map(|m| m.score).collect::<Vec<_>>(),
                "Retrieved context"
            );
            matches
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let prompt = format_prompt(
            user_input,
            &context,
            history,
            &profile.prompts,
            DEFAULT_MAX_CONTEXT_LENGTH,
        );
        let sources = Some(format_sources(&matches)).filter(|s| !s.is_empty());
        (prompt, sources)
    }
}

fn reply(content: String, sources: Option<String>) -> AiReply {
    AiReply {
        content,
        timestamp: now_timestamp(),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::{GENERATION_FAILURE_REPLY, GREETING_FALLBACK_REPLY};
    use crate::llm::{LlmError, LlmResponse};
    use crate::retrieval::testing::{retrieval_match, StaticKnowledgeBase};
    use crate::runtime::testing::MockLlmClient;
    use crate::state_machine::ChatMessage;

    fn state(input: &str) -> ConversationState {
        let mut state = ConversationState::new();
        state.messages.push(ChatMessage::user("Xin chào", "t0"));
        state.messages.push(ChatMessage::user(input, "t1"));
        state.human_input = Some(input.to_string());
        state
    }

    fn runner(kb: Arc<StaticKnowledgeBase>) -> FlowRunner {
        FlowRunner::new(kb, ModelAssignments::uniform("gen-model"))
    }

    #[tokio::test]
    async fn test_unhealthy_knowledge_base_skips_completion() {
        let kb = Arc::new(StaticKnowledgeBase::unhealthy());
        let llm = MockLlmClient::new();

        let reply = runner(kb.clone())
            .generate(&llm, Flow::TuitionFee, &state("Học phí?"))
            .await;

        assert_eq!(reply.content, RETRIEVAL_UNAVAILABLE_REPLY);
        assert!(reply.sources.is_none());
        assert!(llm.recorded_requests().is_empty());
        assert!(kb.queries().is_empty());
    }

    #[tokio::test]
    async fn test_grounded_answer_with_sources() {
        let kb = Arc::new(StaticKnowledgeBase::new(vec![
            retrieval_match("Học phí chương trình tiêu chuẩn 30 triệu", 0.92, "hp_2025.pdf"),
            retrieval_match("Học phí chương trình tiên tiến 80 triệu", 0.81, "hp_tt.pdf"),
        ]));
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("<think>sum</think>Dạ, 30 triệu ạ."));

        let reply = runner(kb.clone())
            .generate(&llm, Flow::TuitionFee, &state("Học phí bao nhiêu?"))
            .await;

        assert_eq!(reply.content, "Dạ, 30 triệu ạ.");
        assert_eq!(
            reply.sources.as_deref(),
            Some("- hp_2025.pdf (relevance: 0.92)\n- hp_tt.pdf (relevance: 0.81)")
        );
        assert_eq!(
            kb.queries(),
            vec![("Học phí bao nhiêu?".to_string(), "tuition_fee".to_string(), 3)]
        );

        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model_id, "gen-model");
        assert_eq!(requests[0].temperature, Some(0.3));
        let prompt = requests[0].last_user_text().unwrap();
        assert!(prompt.contains(
            "Học phí chương trình tiêu chuẩn 30 triệu\n\nHọc phí chương trình tiên tiến 80 triệu"
        ));
        assert!(prompt.contains("User: Xin chào"));
    }

    #[tokio::test]
    async fn test_no_matches_uses_placeholder_context() {
        let kb = Arc::new(StaticKnowledgeBase::new(Vec::new()));
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Dạ, em chưa có thông tin ạ."));

        let reply = runner(kb)
            .generate(&llm, Flow::Graduate, &state("Tiến sĩ mấy năm?"))
            .await;

        assert_eq!(reply.content, "Dạ, em chưa có thông tin ạ.");
        assert!(reply.sources.is_none());
        let prompt = llm.recorded_requests()[0].last_user_text().unwrap().to_string();
        assert!(prompt.contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn test_completion_failure_uses_canned_reply() {
        let kb = Arc::new(StaticKnowledgeBase::new(vec![retrieval_match("x", 0.5, "a.pdf")]));
        let llm = MockLlmClient::new();
        llm.queue_error(LlmError::server_error("HTTP 503"));

        let reply = runner(kb)
            .generate(&llm, Flow::RegulationInfo, &state("Cảnh báo học vụ?"))
            .await;
        assert_eq!(reply.content, GENERATION_FAILURE_REPLY);
        assert!(reply.sources.is_none());
    }

    #[tokio::test]
    async fn test_empty_completion_uses_canned_reply() {
        let kb = Arc::new(StaticKnowledgeBase::new(Vec::new()));
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("<think>hmm</think>  "));

        let reply = runner(kb)
            .generate(&llm, Flow::Greeting, &state("Hello"))
            .await;
        assert_eq!(reply.content, GREETING_FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_direct_flow_ignores_knowledge_base() {
        let kb = Arc::new(StaticKnowledgeBase::unhealthy());
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Dạ, em chào Anh/Chị!"));
        let runner = FlowRunner::new(
            kb.clone(),
            ModelAssignments::uniform("gen-model").with_override(Flow::Greeting, "small-model"),
        );

        let reply = runner.generate(&llm, Flow::Greeting, &state("Hello")).await;

        assert_eq!(reply.content, "Dạ, em chào Anh/Chị!");
        assert!(kb.queries().is_empty());
        let requests = llm.recorded_requests();
        assert_eq!(requests[0].model_id, "small-model");
        assert_eq!(requests[0].temperature, Some(0.7));
        assert!(requests[0]
            .last_user_text()
            .unwrap()
            .ends_with("User's input: Hello\nAnswer:"));
    }

    #[tokio::test]
    async fn test_top_k_is_configurable() {
        let kb = Arc::new(StaticKnowledgeBase::new(Vec::new()));
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("ok"));

        runner(kb.clone())
            .with_top_k(5)
            .generate(&llm, Flow::UniversityInfo, &state("Trường ở đâu?"))
            .await;
        assert_eq!(kb.queries()[0].1, "university_info");
        assert_eq!(kb.queries()[0].2, 5);
    }
}
