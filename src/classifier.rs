//! Topic classifier
//!
//! One JSON-mode completion call per unclassified turn. The model's answer is
//! normalized by [`TopicClassification::from_raw`]; a call that succeeds but
//! returns unreadable output is treated as an uncertain `off_topic`.

use crate::llm::{LlmError, LlmRequest};
use crate::prompt::{format_history, persona, strip_think_tags};
use crate::runtime::LlmClient;
use crate::state_machine::{ConversationState, RawClassification, Topic, TopicClassification};
use std::fmt::Write;
use thiserror::Error;

pub const CLASSIFIER_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Classification call failed: {0}")]
    Completion(#[from] LlmError),
}

/// Description and few-shot examples for one intent
struct IntentGuide {
    topic: Topic,
    title: &'static str,
    description: &'static str,
    examples: &'static [&'static str],
}

const INTENTS: [IntentGuide; 8] = [
    IntentGuide {
        topic: Topic::Greeting,
        title: "Greeting",
        description: "Nếu người dùng chào hỏi Assistant.",
        examples: &[
            "Xin chào",
            "Hello",
            "Chào bạn",
            "Em ơi",
            "Có ai không",
            "Anh/Chị muốn hỏi chút",
            "Cho em hỏi tí nha",
        ],
    },
    IntentGuide {
        topic: Topic::UniversityInfo,
        title: "Thông tin chung về Trường Đại học Bách Khoa",
        description: "Nếu người dùng hỏi về thông tin tổng quan của trường như: lịch sử, địa chỉ, cơ sở, liên hệ, tầm nhìn, sứ mệnh, thành tích.",
        examples: &[
            "Trường Bách Khoa ở đâu vậy?",
            "Trường mình có mấy cơ sở?",
            "Giới thiệu về trường Bách Khoa giúp em.",
            "Sứ mệnh của trường là gì?",
            "Trường có bao nhiêu khoa?",
        ],
    },
    IntentGuide {
        topic: Topic::UndergraduateInfo,
        title: "Thông tin chương trình Đại học (Undergraduate)",
        description: "Nếu người dùng hỏi về ngành học, tuyển sinh, điểm chuẩn, chương trình đào tạo, thời gian học, điều kiện xét tuyển ở bậc đại học.",
        examples: &[
            "Cho em hỏi ngành Khoa học máy tính của Bách Khoa.",
            "Ngành Cơ khí học mấy năm vậy ạ?",
            "Điểm chuẩn ngành Công nghệ thông tin năm ngoái bao nhiêu?",
            "Tuyển sinh đại học năm nay thế nào?",
        ],
    },
    IntentGuide {
        topic: Topic::GraduateInfo,
        title: "Thông tin chương trình Sau đại học (Graduate)",
        description: "Nếu người dùng hỏi về chương trình cao học, thạc sĩ, tiến sĩ, hoặc điều kiện xét tuyển sau đại học.",
        examples: &[
            "Bách Khoa có đào tạo thạc sĩ không?",
            "Điều kiện để học cao học là gì?",
            "Học tiến sĩ tại Bách Khoa mất bao lâu?",
        ],
    },
    IntentGuide {
        topic: Topic::TuitionInfo,
        title: "Thông tin học phí và học bổng",
        description: "Nếu người dùng hỏi về học phí, lệ phí, học bổng, hoặc chính sách miễn giảm học phí.",
        examples: &[
            "Học phí ngành Điện tử của Bách Khoa là bao nhiêu?",
            "Chương trình tiên tiến học phí có cao không?",
            "Có chính sách miễn giảm học phí cho sinh viên khó khăn không?",
        ],
    },
    IntentGuide {
        topic: Topic::RegulationInfo,
        title: "Thông tin quy định và quy chế học tập",
        description: "Nếu người dùng hỏi về quy định học tập, thi cử, bảo lưu, nghỉ học, cảnh báo học vụ, hoặc các quy chế sinh viên.",
        examples: &[
            "Quy định về bảo lưu học tập của Bách Khoa là gì?",
            "Khi nào bị cảnh báo học vụ?",
            "Nếu bị điểm F thì xử lý như thế nào?",
        ],
    },
    IntentGuide {
        topic: Topic::OffTopic,
        title: "Off Topic",
        description: "Nếu câu hỏi không liên quan đến các chủ đề trên.",
        examples: &[
            "Viết thơ đi.",
            "Hôm nay thời tiết thế nào?",
            "Code Python giúp tôi với.",
        ],
    },
    IntentGuide {
        topic: Topic::WannaExit,
        title: "Wanna Exit",
        description: "Nếu người dùng có ý định kết thúc trò chuyện hoặc không muốn hỏi thêm.",
        examples: &[
            "Cảm ơn, em biết rồi.",
            "Không hỏi nữa nha.",
            "Thôi để sau hỏi tiếp.",
            "Bye nhé.",
        ],
    },
];

#[derive(Debug, Clone)]
pub struct TopicClassifier {
    model_id: String,
    temperature: f32,
}

impl TopicClassifier {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: CLASSIFIER_TEMPERATURE,
        }
    }

    /// Classify the latest user turn.
    ///
    /// Only a failed completion call is an error. The caller decides whether
    /// classification is needed at all (the topic may already be sticky).
    pub async fn classify<L: LlmClient + ?Sized>(
        &self,
        llm: &L,
        state: &ConversationState,
    ) -> Result<TopicClassification, ClassificationError> {
        let user_input = state
            .human_input
            .as_deref()
            .or_else(|| state.messages.last().map(|m| m.content.as_str()))
            .unwrap_or_default();
        let history = format_history(state.history());
        let prompt = build_prompt(&history, user_input);

        let request = LlmRequest::user_prompt(&self.model_id, prompt)
            .with_temperature(self.temperature)
            .json();
        let response = llm.complete(&request).await?;

        let classification = parse_response(&response.content);
        tracing::info!(
            topic = %classification.name,
            confidence = classification.confidence,
            model = %self.model_id,
            "Classified user turn"
        );
        Ok(classification)
    }
}

fn topic_list() -> String {
    Topic::ALL
        .into_iter()
        .map(Topic::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classification prompt: persona, conversation, intent guide, output contract
pub fn build_prompt(chat_history: &str, user_input: &str) -> String {
    let topics = topic_list();
    let mut prompt = String::new();

    let _ = write!(
        prompt,
        "# Role\n{}\n\n# Skills\n{}\n- Assistant có khả năng hiểu ngữ cảnh hội thoại để phân loại chính xác chủ đề mà người dùng đang hỏi.\n\n",
        persona::ROLE,
        persona::SKILLS
    );
    let _ = write!(
        prompt,
        "# Context\n```\nChat History:\n{chat_history}\n\nUser's input:\n{user_input}\n```\n\n"
    );

    prompt.push_str("# Tasks\n");
    prompt.push_str(
        "- Assistant MUST đọc kỹ Chat History và User's input để xác định ý định (intent) của người dùng.\n",
    );
    prompt.push_str("- Assistant MUST phân loại ý định này theo các topic sau:\n\n");
    for (i, intent) in INTENTS.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}:", i + 1, intent.title);
        let _ = writeln!(
            prompt,
            "    - {} Return \"{}\"",
            intent.description, intent.topic
        );
        prompt.push_str("    - Example:\n");
        for example in intent.examples {
            let _ = writeln!(prompt, "        - {example}");
        }
        prompt.push('\n');
    }

    let _ = write!(
        prompt,
        "# Output\n- Assistant MUST trả lời bằng JSON format với các field như sau:\n```\n{{\"name\": \"Một trong các giá trị sau: {topics}\", \"confidence\": \"Float score between 0 and 1\", \"context\": \"User's input\"}}\n```\n\n"
    );
    let _ = write!(
        prompt,
        "# Constraints\n- Assistant MUST reply by JSON format ONLY như trong mục Output. No need explanation.\n- Assistant MUST return exactly one of the following topics: {topics}.\n- Trong trường hợp Assistant không thể xác định được topic, Assistant DO NOT attempt to guess the topic, just return \"{}\".\n",
        Topic::OffTopic
    );
    prompt
}

/// Read a classification from raw model output.
///
/// Think markup is removed and the outermost `{...}` is parsed, so prose or
/// code fences around the object are tolerated.
pub fn parse_response(raw: &str) -> TopicClassification {
    let cleaned = strip_think_tags(raw);
    let object = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => cleaned.get(start..=end),
        _ => None,
    };

    let parsed = object.and_then(|json| serde_json::from_str::<RawClassification>(json).ok());
    match parsed {
        Some(raw) => TopicClassification::from_raw(&raw),
        None => {
            tracing::warn!(response = %cleaned, "Unreadable classifier output, treating as off_topic");
            TopicClassification::uncertain(cleaned)
        }
    }
}
