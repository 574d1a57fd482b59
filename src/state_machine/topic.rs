//! Intent taxonomy and the classification record

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Confidence below which a non-`off_topic` intent is demoted to `off_topic`
pub const CONFIDENCE_FLOOR: f64 = 0.5;

/// The eight conversation intents the router understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Greeting,
    OffTopic,
    UniversityInfo,
    UndergraduateInfo,
    GraduateInfo,
    TuitionInfo,
    RegulationInfo,
    WannaExit,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Greeting,
        Topic::OffTopic,
        Topic::UniversityInfo,
        Topic::UndergraduateInfo,
        Topic::GraduateInfo,
        Topic::TuitionInfo,
        Topic::RegulationInfo,
        Topic::WannaExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Greeting => "greeting",
            Topic::OffTopic => "off_topic",
            Topic::UniversityInfo => "university_info",
            Topic::UndergraduateInfo => "undergraduate_info",
            Topic::GraduateInfo => "graduate_info",
            Topic::TuitionInfo => "tuition_info",
            Topic::RegulationInfo => "regulation_info",
            Topic::WannaExit => "wanna_exit",
        }
    }

    /// Parse a classifier label. Case and surrounding whitespace are ignored;
    /// `tuition_fee_info` is accepted as an older spelling of `tuition_info`.
    pub fn parse(name: &str) -> Option<Topic> {
        let normalized = name.trim().to_lowercase();
        if normalized == "tuition_fee_info" {
            return Some(Topic::TuitionInfo);
        }
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == normalized)
    }

    /// Tag the knowledge base uses to partition this topic's documents.
    /// `None` for intents answered without retrieval.
    pub fn retrieval_tag(self) -> Option<&'static str> {
        match self {
            Topic::UniversityInfo => Some("university_info"),
            Topic::UndergraduateInfo => Some("undergraduate"),
            Topic::GraduateInfo => Some("graduate"),
            Topic::TuitionInfo => Some("tuition_fee"),
            Topic::RegulationInfo => Some("regulation_info"),
            Topic::Greeting | Topic::OffTopic | Topic::WannaExit => None,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored intent classification. Only built through [`TopicClassification::from_raw`]
/// or [`TopicClassification::uncertain`], so the confidence policy always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicClassification {
    pub name: Topic,
    pub confidence: f64,
    pub context: String,
}

/// Classifier output exactly as the model produced it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub confidence: Value,
    #[serde(default)]
    pub context: Value,
}

impl TopicClassification {
    /// Normalize a raw classifier answer:
    /// unknown labels become `off_topic`, non-numeric confidence becomes 0.0,
    /// and any intent other than `off_topic` under [`CONFIDENCE_FLOOR`] is
    /// demoted to `off_topic`.
    pub fn from_raw(raw: &RawClassification) -> Self {
        let confidence = coerce_confidence(&raw.confidence);
        let parsed = Topic::parse(&raw.name).unwrap_or(Topic::OffTopic);
        let name = if parsed != Topic::OffTopic && confidence < CONFIDENCE_FLOOR {
            Topic::OffTopic
        } else {
            parsed
        };

        let context = match &raw.context {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Self {
            name,
            confidence,
            context,
        }
    }

    /// Used when the classifier answered but nothing usable could be read
    pub fn uncertain(context: impl Into<String>) -> Self {
        Self {
            name: Topic::OffTopic,
            confidence: 0.0,
            context: context.into(),
        }
    }
}

/// Numbers and numeric strings are accepted; anything else is 0.0.
/// The result is clamped to `[0, 1]`.
pub fn coerce_confidence(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(name: &str, confidence: Value) -> RawClassification {
        RawClassification {
            name: name.to_string(),
            confidence,
            context: json!("ctx"),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Topic::parse("  Greeting "), Some(Topic::Greeting));
        assert_eq!(Topic::parse("TUITION_INFO"), Some(Topic::TuitionInfo));
        assert_eq!(Topic::parse("tuition_fee_info"), Some(Topic::TuitionInfo));
        assert_eq!(Topic::parse("weather"), None);
    }

    #[test]
    fn test_as_str_round_trips_through_parse() {
        for topic in Topic::ALL {
            assert_eq!(Topic::parse(topic.as_str()), Some(topic));
        }
    }

    #[test]
    fn test_retrieval_tags() {
        assert_eq!(Topic::TuitionInfo.retrieval_tag(), Some("tuition_fee"));
        assert_eq!(Topic::UndergraduateInfo.retrieval_tag(), Some("undergraduate"));
        assert_eq!(Topic::Greeting.retrieval_tag(), None);
        assert_eq!(Topic::WannaExit.retrieval_tag(), None);
    }

    #[test]
    fn test_low_confidence_demoted() {
        let c = TopicClassification::from_raw(&raw("tuition_info", json!(0.3)));
        assert_eq!(c.name, Topic::OffTopic);
        assert!(approx(c.confidence, 0.3));
    }

    #[test]
    fn test_floor_is_inclusive() {
        let c = TopicClassification::from_raw(&raw("graduate_info", json!(0.5)));
        assert_eq!(c.name, Topic::GraduateInfo);
    }

    #[test]
    fn test_off_topic_kept_at_zero_confidence() {
        let c = TopicClassification::from_raw(&raw("off_topic", json!("not a number")));
        assert_eq!(c.name, Topic::OffTopic);
        assert!(approx(c.confidence, 0.0));
    }

    #[test]
    fn test_numeric_string_confidence() {
        let c = TopicClassification::from_raw(&raw("Greeting", json!(" 0.92 ")));
        assert_eq!(c.name, Topic::Greeting);
        assert!(approx(c.confidence, 0.92));
    }

    #[test]
    fn test_confidence_clamped() {
        assert!(approx(coerce_confidence(&json!(7)), 1.0));
        assert!(approx(coerce_confidence(&json!(-2.0)), 0.0));
        assert!(approx(coerce_confidence(&json!(null)), 0.0));
        assert!(approx(coerce_confidence(&json!("NaN")), 0.0));
    }

    #[test]
    fn test_unknown_name_becomes_off_topic() {
        let c = TopicClassification::from_raw(&raw("sports", json!(0.99)));
        assert_eq!(c.name, Topic::OffTopic);
    }

    #[test]
    fn test_non_string_context_is_stringified() {
        let mut r = raw("greeting", json!(0.9));
        r.context = json!({"lang": "vi"});
        let c = TopicClassification::from_raw(&r);
        assert_eq!(c.context, r#"{"lang":"vi"}"#);
    }
}
