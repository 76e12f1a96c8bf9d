//! Property-based tests for record framing
//!
//! The delta sequence must not depend on where the network happened to
//! cut the byte feed.

use super::*;
use crate::llm::LlmError;
use futures::StreamExt;
use proptest::prelude::*;

fn arb_content() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 .,!?]{0,12}",
        Just("<think>".to_string()),
        Just("</think>".to_string()),
        Just("\n\n".to_string()),
        Just("héllo wörld 😀".to_string()),
        Just("\"quoted\" \\ back".to_string()),
    ]
}

fn encode(contents: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for content in contents {
        let record = serde_json::json!({
            "message": {"role": "assistant", "content": content},
            "done": false,
        });
        out.extend_from_slice(record.to_string().as_bytes());
        out.push(b'\n');
    }
    out.extend_from_slice(b"{\"done\":true}\n");
    out
}

/// Cut `bytes` at the given (sorted, deduplicated) offsets
fn rechunk(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<Vec<u8>> {
    cuts.retain(|&c| c > 0 && c < bytes.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn collect_deltas(chunks: Vec<Vec<u8>>) -> Vec<StreamItem> {
    let source = futures::stream::iter(chunks.into_iter().map(Ok::<_, LlmError>));
    futures::executor::block_on(deltas(source).collect::<Vec<_>>())
        .into_iter()
        .map(|item| item.expect("well-formed feed"))
        .collect()
}

proptest! {
    #[test]
    fn framing_is_independent_of_read_boundaries(
        contents in proptest::collection::vec(arb_content(), 0..12),
        cuts in proptest::collection::vec(0usize..2048, 0..16),
    ) {
        let bytes = encode(&contents);
        let whole = collect_deltas(vec![bytes.clone()]);
        let split = collect_deltas(rechunk(&bytes, cuts));

        prop_assert_eq!(&whole, &split);
        prop_assert_eq!(whole.len(), contents.len() + 1);
        prop_assert!(whole.last().is_some_and(|item| item.done));

        let joined: String = whole.iter().map(|item| item.delta.as_str()).collect();
        prop_assert_eq!(joined, contents.concat());
    }

    #[test]
    fn byte_at_a_time_feed_matches(contents in proptest::collection::vec(arb_content(), 1..6)) {
        let bytes = encode(&contents);
        let single: Vec<Vec<u8>> = bytes.iter().map(|b| vec![*b]).collect();
        prop_assert_eq!(collect_deltas(vec![bytes]), collect_deltas(single));
    }
}
