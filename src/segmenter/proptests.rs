//! Property-based tests for the turn segmenter

use super::*;
use proptest::prelude::*;

/// Deltas biased towards marker fragments so markers straddle boundaries
fn arb_delta() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z ]{0,8}",
        1 => Just("<think>".to_string()),
        1 => Just("</think>".to_string()),
        1 => Just("</th".to_string()),
        1 => Just("ink>".to_string()),
        1 => Just("\n\n".to_string()),
        1 => Just("ü€".to_string()),
    ]
}

fn arb_deltas() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_delta(), 0..24)
}

/// Deltas that can never assemble a closing marker
fn arb_open_only_deltas() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(
        prop_oneof![
            "[a-z ]{0,8}",
            Just("<think>".to_string()),
            Just("\n\n".to_string()),
        ],
        0..24,
    )
}

proptest! {
    #[test]
    fn no_close_marker_never_renderable(deltas in arb_open_only_deltas()) {
        let markers = MarkerPair::default();
        let mut raw = String::new();
        for delta in &deltas {
            raw.push_str(delta);
            let seg = segment(&raw, &markers);
            prop_assert!(!seg.is_renderable());
            prop_assert_eq!(seg.reasoning, None);
        }
    }

    #[test]
    fn finalization_is_monotonic(deltas in arb_deltas()) {
        let markers = MarkerPair::default();
        let mut raw = String::new();
        let mut first_close: Option<usize> = None;

        for delta in &deltas {
            raw.push_str(delta);
            let seg = segment(&raw, &markers);

            if first_close.is_none() {
                first_close = raw.find("</think>");
            }

            match first_close {
                Some(at) => {
                    let expected = raw.get(at + "</think>".len()..).unwrap();
                    prop_assert_eq!(seg.final_text.as_deref(), Some(expected));
                }
                None => prop_assert!(!seg.is_renderable()),
            }
        }
    }

    #[test]
    fn segmentation_is_idempotent(deltas in arb_deltas()) {
        let markers = MarkerPair::default();
        let raw = deltas.concat();
        prop_assert_eq!(segment(&raw, &markers), segment(&raw, &markers));
    }

    #[test]
    fn tracker_agrees_with_full_rescan(deltas in arb_deltas()) {
        let markers = MarkerPair::default();
        let mut tracker = SegmentTracker::new();
        let mut raw = String::new();

        for delta in &deltas {
            raw.push_str(delta);
            let incremental = tracker.update(&raw, &markers);
            let full = segment(&raw, &markers);
            prop_assert_eq!(tracker.phase(), full.phase());
            prop_assert_eq!(incremental, full);
        }
    }
}
