//! Per-flow prompts, sampling temperature and fallback replies

use crate::prompt::{persona, SystemPrompts};
use crate::state_machine::Flow;

/// Reply when the knowledge base is unhealthy; no completion call is made
pub const RETRIEVAL_UNAVAILABLE_REPLY: &str =
    "Dạ, hiện tại hệ thống tra cứu thông tin đang tạm thời không khả dụng. Anh/Chị vui lòng thử lại sau ạ.";

/// Prompt context when retrieval found nothing
pub const NO_CONTEXT: &str = "Không tìm thấy thông tin liên quan.";

pub const GENERATION_FAILURE_REPLY: &str = "Xin lỗi, tôi đã gặp lỗi khi tạo câu trả lời.";

pub const GREETING_FALLBACK_REPLY: &str =
    "Dạ, em chào Anh/Chị! Em có thể hỗ trợ gì cho Anh/Chị về Trường Đại học Bách Khoa ạ?";

pub const OFF_TOPIC_FALLBACK_REPLY: &str =
    "Dạ, em chỉ có thể hỗ trợ các thông tin liên quan đến Trường Đại học Bách Khoa. Anh/Chị cần hỏi gì về trường ạ?";

pub const GOODBYE_FALLBACK_REPLY: &str = "Tạm biệt bạn! Xin hẹn gặp lại.";

/// Generic apology for a turn that produced no reply
pub const APOLOGY_REPLY: &str = "Dạ, có vẻ đã xảy ra lỗi. Xin Anh/Chị thử lại.";

const RETRIEVAL_TEMPERATURE: f32 = 0.3;
const CONVERSATIONAL_TEMPERATURE: f32 = 0.7;

/// Everything a flow's generation step needs besides the conversation
#[derive(Debug, Clone)]
pub struct FlowProfile {
    pub flow: Flow,
    /// Knowledge-base partition; `None` for flows answered without retrieval
    pub retrieval_tag: Option<&'static str>,
    pub prompts: SystemPrompts,
    pub temperature: f32,
    /// Used when the completion call fails or returns nothing
    pub failure_reply: &'static str,
}

impl FlowProfile {
    #[cfg(test)]
    pub fn uses_retrieval(&self) -> bool {
        self.retrieval_tag.is_some()
    }
}

pub fn profile(flow: Flow) -> FlowProfile {
    let retrieval_tag = flow.topic().retrieval_tag();
    let (prompts, temperature, failure_reply) = match flow {
        Flow::Greeting => (
            greeting_prompts(),
            CONVERSATIONAL_TEMPERATURE,
            GREETING_FALLBACK_REPLY,
        ),
        Flow::OffTopic => (
            off_topic_prompts(),
            CONVERSATIONAL_TEMPERATURE,
            OFF_TOPIC_FALLBACK_REPLY,
        ),
        Flow::WannaExit => (
            goodbye_prompts(),
            CONVERSATIONAL_TEMPERATURE,
            GOODBYE_FALLBACK_REPLY,
        ),
        Flow::UniversityInfo
        | Flow::Undergraduate
        | Flow::Graduate
        | Flow::TuitionFee
        | Flow::RegulationInfo => (
            knowledge_prompts(flow),
            RETRIEVAL_TEMPERATURE,
            GENERATION_FAILURE_REPLY,
        ),
    };

    FlowProfile {
        flow,
        retrieval_tag,
        prompts,
        temperature,
        failure_reply,
    }
}

fn short_reply_constraints(limit_words: u32) -> String {
    format!(
        "- Keep the answer concise (under {limit_words} words).\n- Assistant MUST use the same language as the User's language to reply.\n{}",
        persona::FORM_ADDRESS_IN_VN
    )
}

fn greeting_prompts() -> SystemPrompts {
    SystemPrompts {
        role: persona::ROLE.to_string(),
        tone: persona::TONE.to_string(),
        tasks: format!(
            "- The user is greeting the Assistant.\n- The Assistant MUST greet the user back and introduce itself as {}.\n- Ask which information about {} the user needs help with.",
            persona::ASSISTANT_NAME,
            persona::UNIVERSITY_NAME
        ),
        constraints: short_reply_constraints(60),
        ..Default::default()
    }
}

fn off_topic_prompts() -> SystemPrompts {
    SystemPrompts {
        role: persona::ROLE.to_string(),
        tone: persona::TONE.to_string(),
        tasks: format!(
            "- The user's input is not related to {university}.\n- The Assistant MUST politely explain that it only supports information about {university}: admissions, programs, tuition fees and academic regulations.\n- DO NOT answer the unrelated request.\n- Invite the user to ask a question about the university.",
            university = persona::UNIVERSITY_NAME
        ),
        constraints: short_reply_constraints(80),
        ..Default::default()
    }
}

fn goodbye_prompts() -> SystemPrompts {
    SystemPrompts {
        role: persona::ROLE.to_string(),
        tone: persona::TONE.to_string(),
        tasks: "- The user wants to end the conversation or say goodbye.\n- The Assistant MUST politely say goodbye to the user.\n- Wish the user a good day or success in their studies.".to_string(),
        constraints: short_reply_constraints(50),
        ..Default::default()
    }
}

fn knowledge_prompts(flow: Flow) -> SystemPrompts {
    let (tasks, examples): (String, &str) = match flow {
        Flow::UniversityInfo => (
            format!(
                "If the user asks about general information such as history, addresses, campuses, contacts, vision, mission or achievements, provide the corresponding information of {}.",
                persona::UNIVERSITY_NAME
            ),
            "- Trường Bách Khoa ở đâu vậy?\n- Trường mình có mấy cơ sở?\n- Sứ mệnh của trường là gì?",
        ),
        Flow::Undergraduate => (
            format!(
                "If the user asks about majors, admissions, benchmark scores, curricula, study duration or admission requirements at undergraduate level, provide the corresponding undergraduate information of {}.",
                persona::UNIVERSITY_NAME
            ),
            "- Cho em hỏi ngành Khoa học máy tính của Bách Khoa.\n- Ngành Cơ khí học mấy năm vậy ạ?\n- Điểm chuẩn ngành Công nghệ thông tin năm ngoái bao nhiêu?",
        ),
        Flow::Graduate => (
            format!(
                "If the user asks about graduate programs such as master's or doctoral degrees, or admission requirements for postgraduate studies, provide the corresponding graduate information of {}.",
                persona::UNIVERSITY_NAME
            ),
            "- Bách Khoa có đào tạo thạc sĩ không?\n- Điều kiện để học cao học là gì?\n- Học tiến sĩ tại Bách Khoa mất bao lâu?",
        ),
        Flow::TuitionFee => (
            "If the user asks about tuition fees, charges, scholarships, or tuition exemption and reduction policies, provide accurate information from the database.".to_string(),
            "- Học phí ngành Điện tử của Bách Khoa là bao nhiêu?\n- Chương trình tiên tiến học phí có cao không?\n- Có chính sách miễn giảm học phí cho sinh viên khó khăn không?",
        ),
        _ => (
            format!(
                "If the user asks about academic regulations, examinations, leave of absence, academic warning, or other student policies, provide accurate and detailed information based on the official regulations of {}.",
                persona::UNIVERSITY_NAME
            ),
            "- Quy định về bảo lưu học tập của Bách Khoa là gì?\n- Khi nào bị cảnh báo học vụ?",
        ),
    };

    SystemPrompts {
        role: persona::ROLE.to_string(),
        skills: persona::SKILLS.to_string(),
        tone: persona::TONE.to_string(),
        tasks,
        examples: examples.to_string(),
        constraints: format!("{}\n{}", persona::ANSWER_CONSTRAINTS, persona::FORM_ADDRESS_IN_VN),
        important_information: persona::IMPORTANT_INFORMATION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_flows_have_tags() {
        let tagged: Vec<_> = Flow::ALL
            .into_iter()
            .filter_map(|f| profile(f).retrieval_tag)
            .collect();
        assert_eq!(
            tagged,
            vec![
                "university_info",
                "undergraduate",
                "graduate",
                "tuition_fee",
                "regulation_info"
            ]
        );
        for flow in [Flow::Greeting, Flow::OffTopic, Flow::WannaExit] {
            assert!(!profile(flow).uses_retrieval(), "{flow}");
        }
    }

    #[test]
    fn test_failure_replies() {
        assert_eq!(profile(Flow::WannaExit).failure_reply, GOODBYE_FALLBACK_REPLY);
        assert_eq!(profile(Flow::Greeting).failure_reply, GREETING_FALLBACK_REPLY);
        assert_eq!(profile(Flow::OffTopic).failure_reply, OFF_TOPIC_FALLBACK_REPLY);
        assert_eq!(profile(Flow::TuitionFee).failure_reply, GENERATION_FAILURE_REPLY);
    }

    #[test]
    fn test_temperatures() {
        assert!((profile(Flow::Graduate).temperature - 0.3).abs() < f32::EPSILON);
        assert!((profile(Flow::Greeting).temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_knowledge_prompts_are_distinct() {
        let tasks: std::collections::HashSet<_> = Flow::ALL
            .into_iter()
            .map(|f| profile(f).prompts.tasks)
            .collect();
        assert_eq!(tasks.len(), 8);
        assert!(profile(Flow::TuitionFee)
            .prompts
            .important_information
            .contains(persona::UNIVERSITY_HOTLINE));
    }
}
