//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary delta sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::render::IdentityRenderer;
use crate::segmenter::{MarkerPair, TurnPhase};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new(
        "test-conv",
        "test-model",
        MarkerPair::default(),
        Arc::new(IdentityRenderer),
    )
}

fn empty_conversation() -> Conversation {
    Conversation::new("test-conv", Utc.timestamp_opt(0, 0).unwrap())
}

fn step(conv: &Conversation, event: Event) -> TransitionResult {
    transition(conv, &test_context(), event).expect("valid transition")
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_delta() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-zA-Z .]{0,10}",
        1 => Just("<think>".to_string()),
        1 => Just("</think>".to_string()),
        1 => Just("</thi".to_string()),
        1 => Just("nk>".to_string()),
        1 => Just("\n\n".to_string()),
    ]
}

fn arb_user_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{1,20}",
        Just(String::new()),
        Just("   ".to_string()),
        Just("\n\t".to_string()),
    ]
}

fn arb_terminal_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::StreamComplete),
        Just(Event::StreamFailed {
            message: "broken".to_string(),
            error_kind: ErrorKind::MalformedRecord,
        }),
    ]
}

/// One full request cycle: user input, some deltas, an ending
fn arb_cycle() -> impl Strategy<Value = (String, Vec<String>, Event)> {
    (
        arb_user_text(),
        proptest::collection::vec(arb_delta(), 0..12),
        arb_terminal_event(),
    )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn in_progress_turn_is_always_last_and_unique(
        text in "[a-z]{1,10}",
        deltas in proptest::collection::vec(arb_delta(), 1..20),
    ) {
        let mut conv = step(&empty_conversation(), Event::UserMessage { text }).new_state;

        for delta in deltas {
            conv = step(&conv, Event::StreamDelta { delta }).new_state;

            // Exactly one assistant turn for the whole cycle
            prop_assert_eq!(conv.turns.len(), 2);
            let last = conv.turns.last().unwrap();
            prop_assert_eq!(conv.in_progress(), Some(last));
            prop_assert_eq!(last.role, Role::Assistant);
        }
    }

    #[test]
    fn raw_content_never_shrinks(deltas in proptest::collection::vec(arb_delta(), 1..20)) {
        let mut conv = step(&empty_conversation(), Event::UserMessage { text: "q".into() }).new_state;
        let mut previous = 0;

        for delta in deltas {
            conv = step(&conv, Event::StreamDelta { delta }).new_state;
            let len = conv.turns[1].raw_content.len();
            prop_assert!(len >= previous);
            previous = len;
        }
    }

    #[test]
    fn finalized_turn_never_regresses(deltas in proptest::collection::vec(arb_delta(), 1..20)) {
        let mut conv = step(&empty_conversation(), Event::UserMessage { text: "q".into() }).new_state;
        let mut finalized = false;

        for delta in deltas {
            conv = step(&conv, Event::StreamDelta { delta }).new_state;
            let turn = &conv.turns[1];

            if finalized {
                prop_assert_eq!(turn.phase, Some(TurnPhase::Finalized));
            }
            finalized = turn.phase == Some(TurnPhase::Finalized);

            if finalized {
                let (_, after) = turn.raw_content.split_once("</think>").unwrap();
                prop_assert_eq!(&turn.display_content, after);
            } else {
                prop_assert_eq!(&turn.display_content, &turn.raw_content);
                prop_assert_eq!(&turn.reasoning, &None);
            }
        }
    }

    #[test]
    fn transitions_are_deterministic(
        text in "[a-z]{1,10}",
        deltas in proptest::collection::vec(arb_delta(), 0..10),
    ) {
        let run = || {
            let mut conv = step(&empty_conversation(), Event::UserMessage { text: text.clone() }).new_state;
            for delta in &deltas {
                conv = step(&conv, Event::StreamDelta { delta: delta.clone() }).new_state;
            }
            conv
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn every_cycle_ends_idle_with_one_reply_at_most(
        cycles in proptest::collection::vec(arb_cycle(), 1..5),
    ) {
        let mut conv = empty_conversation();

        for (text, deltas, ending) in cycles {
            let before = conv.turns.len();
            let started = step(&conv, Event::UserMessage { text: text.clone() });

            if text.trim().is_empty() {
                // No turn appended, no request issued
                prop_assert!(started.effects.is_empty());
                prop_assert_eq!(&started.new_state, &conv);
                continue;
            }
            conv = started.new_state;

            let had_deltas = !deltas.is_empty();
            for delta in deltas {
                conv = step(&conv, Event::StreamDelta { delta }).new_state;
            }
            let failed = matches!(ending, Event::StreamFailed { .. });
            conv = step(&conv, ending).new_state;

            prop_assert_eq!(&conv.state, &ConvState::Idle);
            let replies = conv.turns.len() - before - 1;
            if failed {
                prop_assert_eq!(replies, 1);
                prop_assert!(conv.turns.last().unwrap().is_error());
            } else {
                prop_assert_eq!(replies, usize::from(had_deltas));
            }
        }
    }
}
