//! Flow controller: maps a sticky intent to the flow that handles it

use super::topic::{Topic, TopicClassification};
use serde::{Deserialize, Serialize};

/// One of the eight conversation flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    #[serde(rename = "greeting_flow")]
    Greeting,
    #[serde(rename = "off_topic_flow")]
    OffTopic,
    #[serde(rename = "uni_info_flow")]
    UniversityInfo,
    #[serde(rename = "undergraduate_flow")]
    Undergraduate,
    #[serde(rename = "graduate_flow")]
    Graduate,
    #[serde(rename = "tuition_fee_flow")]
    TuitionFee,
    #[serde(rename = "regulation_info_flow")]
    RegulationInfo,
    #[serde(rename = "wanna_exit_flow")]
    WannaExit,
}

impl Flow {
    pub const ALL: [Flow; 8] = [
        Flow::Greeting,
        Flow::OffTopic,
        Flow::UniversityInfo,
        Flow::Undergraduate,
        Flow::Graduate,
        Flow::TuitionFee,
        Flow::RegulationInfo,
        Flow::WannaExit,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Flow::Greeting => "greeting_flow",
            Flow::OffTopic => "off_topic_flow",
            Flow::UniversityInfo => "uni_info_flow",
            Flow::Undergraduate => "undergraduate_flow",
            Flow::Graduate => "graduate_flow",
            Flow::TuitionFee => "tuition_fee_flow",
            Flow::RegulationInfo => "regulation_info_flow",
            Flow::WannaExit => "wanna_exit_flow",
        }
    }

    /// Upper-case key without the `_flow` suffix, e.g. `TUITION_FEE`
    pub fn env_key(self) -> String {
        self.key().trim_end_matches("_flow").to_uppercase()
    }

    /// The intent this flow serves (inverse of [`dispatch`])
    pub fn topic(self) -> Topic {
        match self {
            Flow::Greeting => Topic::Greeting,
            Flow::OffTopic => Topic::OffTopic,
            Flow::UniversityInfo => Topic::UniversityInfo,
            Flow::Undergraduate => Topic::UndergraduateInfo,
            Flow::Graduate => Topic::GraduateInfo,
            Flow::TuitionFee => Topic::TuitionInfo,
            Flow::RegulationInfo => Topic::RegulationInfo,
            Flow::WannaExit => Topic::WannaExit,
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Dispatch table. Exhaustive, so adding an intent without a flow does not compile.
pub fn dispatch(topic: Topic) -> Flow {
    match topic {
        Topic::Greeting => Flow::Greeting,
        Topic::OffTopic => Flow::OffTopic,
        Topic::UniversityInfo => Flow::UniversityInfo,
        Topic::UndergraduateInfo => Flow::Undergraduate,
        Topic::GraduateInfo => Flow::Graduate,
        Topic::TuitionInfo => Flow::TuitionFee,
        Topic::RegulationInfo => Flow::RegulationInfo,
        Topic::WannaExit => Flow::WannaExit,
    }
}

/// Select the flow for the current sticky topic; no topic means `off_topic`
pub fn select_flow(topic: Option<&TopicClassification>) -> Flow {
    topic.map_or(Flow::OffTopic, |t| dispatch(t.name))
}

/// Select a flow from a raw intent label; unmapped labels go to `off_topic`
#[cfg(test)]
pub fn select_flow_by_name(name: &str) -> Flow {
    Topic::parse(name).map_or(Flow::OffTopic, dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dispatch_is_one_to_one() {
        let flows: HashSet<Flow> = Topic::ALL.into_iter().map(dispatch).collect();
        assert_eq!(flows.len(), 8);
        for topic in Topic::ALL {
            assert_eq!(dispatch(topic).topic(), topic);
        }
    }

    #[test]
    fn test_select_flow_defaults_to_off_topic() {
        assert_eq!(select_flow(None), Flow::OffTopic);
        assert_eq!(select_flow_by_name("horoscope"), Flow::OffTopic);
        assert_eq!(select_flow_by_name(""), Flow::OffTopic);
    }

    #[test]
    fn test_select_flow_by_name() {
        assert_eq!(select_flow_by_name("tuition_info"), Flow::TuitionFee);
        assert_eq!(select_flow_by_name("tuition_fee_info"), Flow::TuitionFee);
        assert_eq!(select_flow_by_name("university_info"), Flow::UniversityInfo);
    }

    #[test]
    fn test_flow_keys() {
        assert_eq!(Flow::UniversityInfo.key(), "uni_info_flow");
        assert_eq!(Flow::TuitionFee.env_key(), "TUITION_FEE");
        assert_eq!(Flow::WannaExit.to_string(), "wanna_exit_flow");
        assert_eq!(
            serde_json::to_string(&Flow::RegulationInfo).unwrap(),
            "\"regulation_info_flow\""
        );
    }
}
