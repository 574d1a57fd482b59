//! Property-based tests for the routing state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::topic::coerce_confidence;
use super::transition::*;
use super::*;
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_topic() -> impl Strategy<Value = Topic> {
    (0..Topic::ALL.len()).prop_map(|i| Topic::ALL[i])
}

fn arb_confidence_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1.0f64..2.0).prop_map(|c| json!(c)),
        (0.0f64..1.0).prop_map(|c| json!(format!("{c}"))),
        "[a-z ]{0,10}".prop_map(Value::String),
        Just(Value::Null),
        Just(json!(true)),
    ]
}

fn arb_classification() -> impl Strategy<Value = TopicClassification> {
    (arb_topic(), 0.0f64..=1.0, "[a-z ]{0,20}").prop_map(|(name, confidence, context)| {
        TopicClassification {
            name,
            confidence,
            context,
        }
    })
}

fn arb_message() -> impl Strategy<Value = ChatMessage> {
    (any::<bool>(), "[a-zA-Z ]{1,30}").prop_map(|(is_user, content)| {
        if is_user {
            ChatMessage::user(content, "2024-01-01 00:00:00")
        } else {
            ChatMessage::assistant(&AiReply {
                content,
                timestamp: "2024-01-01 00:00:01".to_string(),
                sources: None,
            })
        }
    })
}

fn arb_idle_state() -> impl Strategy<Value = ConversationState> {
    (
        prop::collection::vec(arb_message(), 0..6),
        prop::option::of(arb_classification()),
    )
        .prop_map(|(messages, topic)| ConversationState::from_history(messages, topic))
}

fn arb_busy_phase() -> impl Strategy<Value = RouterPhase> {
    prop_oneof![
        Just(RouterPhase::Classifying),
        Just(RouterPhase::Resetting),
        (0..Flow::ALL.len()).prop_map(|i| RouterPhase::Generating { flow: Flow::ALL[i] }),
    ]
}

fn user_turn(content: &str) -> Event {
    Event::UserTurn {
        content: content.to_string(),
        timestamp: "2024-01-01 00:00:02".to_string(),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Once a topic is set, a later classification never replaces it
    #[test]
    fn sticky_topic_never_overwritten(
        existing in arb_classification(),
        incoming in arb_classification(),
    ) {
        let kept = apply_classification(Some(&existing), incoming.clone());
        prop_assert_eq!(&kept, &existing);

        let mut state = ConversationState::new();
        state.topic = Some(existing.clone());
        state.phase = RouterPhase::Classifying;
        let result = transition(&state, Event::TopicClassified(incoming)).unwrap();
        prop_assert_eq!(result.new_state.topic, Some(existing));
    }

    /// A user turn with a sticky topic never asks for classification
    #[test]
    fn sticky_topic_skips_classifier(existing in arb_classification(), text in "[a-z ]{1,20}") {
        let mut state = ConversationState::new();
        state.topic = Some(existing.clone());
        let result = transition(&state, user_turn(&text)).unwrap();
        prop_assert!(!result.effects.contains(&Effect::ClassifyTopic));
        prop_assert_eq!(result.new_state.selected_flow, Some(dispatch(existing.name)));
    }

    /// Non-off_topic intents under the floor are stored as off_topic
    #[test]
    fn low_confidence_demoted(topic in arb_topic(), confidence in 0.0f64..CONFIDENCE_FLOOR) {
        let raw = RawClassification {
            name: topic.as_str().to_string(),
            confidence: json!(confidence),
            context: Value::Null,
        };
        let stored = TopicClassification::from_raw(&raw);
        prop_assert_eq!(stored.name, Topic::OffTopic);
    }

    /// off_topic is accepted whatever the confidence, even a non-numeric one
    #[test]
    fn off_topic_accepted_at_any_confidence(confidence in arb_confidence_value()) {
        let raw = RawClassification {
            name: "OFF_TOPIC".to_string(),
            confidence,
            context: Value::Null,
        };
        let stored = TopicClassification::from_raw(&raw);
        prop_assert_eq!(stored.name, Topic::OffTopic);
        prop_assert!((0.0..=1.0).contains(&stored.confidence));
    }

    /// Stored confidence is always within [0, 1]
    #[test]
    fn confidence_always_in_range(value in arb_confidence_value()) {
        let c = coerce_confidence(&value);
        prop_assert!((0.0..=1.0).contains(&c));
    }

    /// Topic reset always yields an absent topic and is idempotent
    #[test]
    fn reset_topic_idempotent(state in arb_idle_state()) {
        let once = reset_topic(state.clone());
        let twice = reset_topic(once.clone());
        prop_assert!(once.topic.is_none());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.messages, state.messages);
    }

    /// Flow selection is a pure function of the topic name
    #[test]
    fn dispatch_is_pure(topic in arb_topic(), confidence in 0.0f64..=1.0) {
        let a = TopicClassification { name: topic, confidence, context: "a".to_string() };
        let b = TopicClassification { name: topic, confidence: 1.0 - confidence, context: "b".to_string() };
        prop_assert_eq!(select_flow(Some(&a)), select_flow(Some(&b)));
        prop_assert_eq!(select_flow_by_name(topic.as_str()), dispatch(topic));
    }

    /// Unmapped names go to the off_topic flow
    #[test]
    fn unmapped_name_goes_off_topic(name in "[a-z]{1,12}") {
        prop_assume!(Topic::parse(&name).is_none());
        prop_assert_eq!(select_flow_by_name(&name), Flow::OffTopic);
    }

    /// Any turn that runs to completion appends exactly two messages and ends
    /// idle with no topic
    #[test]
    fn full_turn_ends_idle_without_topic(
        state in arb_idle_state(),
        classification in arb_classification(),
        text in "[a-z ]{1,20}",
        answer in "[a-z ]{1,20}",
    ) {
        let before = state.messages.len();
        let mut current = transition(&state, user_turn(&text)).unwrap().new_state;

        if current.phase == RouterPhase::Classifying {
            current = transition(&current, Event::TopicClassified(classification)).unwrap().new_state;
        }
        let generating = matches!(current.phase, RouterPhase::Generating { .. });
        prop_assert!(generating);

        let reply = AiReply { content: answer, timestamp: "t".to_string(), sources: None };
        current = transition(&current, Event::ReplyGenerated(reply.clone())).unwrap().new_state;
        let result = transition(&current, Event::TopicReset).unwrap();

        prop_assert!(result.new_state.topic.is_none());
        prop_assert!(result.new_state.is_idle());
        prop_assert_eq!(result.new_state.messages.len(), before + 2);
        prop_assert_eq!(result.new_state.ai_reply, Some(reply));
    }

    /// A user turn is rejected while another turn is in flight
    #[test]
    fn busy_phase_rejects_user_turn(state in arb_idle_state(), phase in arb_busy_phase()) {
        let mut state = state;
        state.phase = phase;
        prop_assert_eq!(transition(&state, user_turn("x")).unwrap_err(), TransitionError::Busy);
    }
}
