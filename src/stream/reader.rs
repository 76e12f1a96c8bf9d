//! Delta extraction from a framed chat response

use super::framing::{RecordFramer, RecordTooLong};
use crate::llm::{ChatChunk, LlmError};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use thiserror::Error;

/// One content increment from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamItem {
    pub delta: String,
    /// Set on the record that marks the end of the response
    pub done: bool,
}

/// Failures that end the turn
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{0}")]
    Transport(#[from] LlmError),
    #[error("Malformed stream record: {source}")]
    MalformedRecord {
        record: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    RecordTooLong(#[from] RecordTooLong),
    #[error("Stream record is not valid UTF-8")]
    InvalidUtf8,
    #[error("Model error: {0}")]
    Upstream(String),
}

/// Parse one framed record into a delta
pub fn parse_record(record: &[u8]) -> Result<StreamItem, StreamError> {
    let text = std::str::from_utf8(record).map_err(|_| StreamError::InvalidUtf8)?;
    let chunk: ChatChunk =
        serde_json::from_str(text).map_err(|source| StreamError::MalformedRecord {
            record: text.to_string(),
            source,
        })?;

    if let Some(message) = chunk.error {
        return Err(StreamError::Upstream(message));
    }

    Ok(StreamItem {
        delta: chunk.delta().to_string(),
        done: chunk.done,
    })
}

struct ReaderState<S> {
    bytes: S,
    framer: RecordFramer,
    ready: VecDeque<Vec<u8>>,
    finished: bool,
}

/// Turn a raw response body into a stream of deltas.
///
/// Ends after the `done` record, after the body closes, or after the first
/// error; nothing is read past a failure.
pub fn deltas<S>(bytes: S) -> impl Stream<Item = Result<StreamItem, StreamError>>
where
    S: Stream<Item = Result<Vec<u8>, LlmError>> + Unpin,
{
    let state = ReaderState {
        bytes,
        framer: RecordFramer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(record) = state.ready.pop_front() {
                let item = parse_record(&record);
                if !matches!(item, Ok(StreamItem { done: false, .. })) {
                    state.finished = true;
                }
                return Some((item, state));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.framer.push(&chunk) {
                    Ok(records) => state.ready.extend(records),
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e.into()), state));
                    }
                },
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(StreamError::Transport(e)), state));
                }
                None => match state.framer.finish() {
                    Some(record) => state.ready.push_back(record),
                    None => return None,
                },
            }
        }
    })
}
