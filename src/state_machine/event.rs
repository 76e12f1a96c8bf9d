//! Events that can occur in a conversation

use super::state::ErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },

    // Stream events
    StreamDelta {
        delta: String,
    },
    StreamComplete,
    StreamFailed {
        message: String,
        error_kind: ErrorKind,
    },
}
