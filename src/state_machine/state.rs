//! Conversation state types

use crate::llm::{LlmErrorKind, LlmMessage};
use crate::render::Renderer;
use crate::segmenter::{MarkerPair, SegmentTracker, TurnPhase};
use crate::stream::StreamError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// User-visible text of the synthetic turn that replaces a failed response
pub const ERROR_TURN_TEXT: &str = "Error: Unable to fetch response.";

// ============================================================================
// Turns
// ============================================================================

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// How `display_content` must be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Show verbatim, escaped
    Text,
    /// Rendered markup
    Html,
}

/// Error classification for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    ServerError,
    ModelNotFound,
    InvalidRequest,
    MalformedRecord,
    Upstream,
    Unknown,
}

impl From<LlmErrorKind> for ErrorKind {
    fn from(kind: LlmErrorKind) -> Self {
        match kind {
            LlmErrorKind::Network => ErrorKind::Network,
            LlmErrorKind::ServerError => ErrorKind::ServerError,
            LlmErrorKind::ModelNotFound => ErrorKind::ModelNotFound,
            LlmErrorKind::InvalidRequest => ErrorKind::InvalidRequest,
            LlmErrorKind::Unknown => ErrorKind::Unknown,
        }
    }
}

impl From<&StreamError> for ErrorKind {
    fn from(err: &StreamError) -> Self {
        match err {
            StreamError::Transport(e) => e.kind.into(),
            StreamError::MalformedRecord { .. }
            | StreamError::RecordTooLong(_)
            | StreamError::InvalidUtf8 => ErrorKind::MalformedRecord,
            StreamError::Upstream(_) => ErrorKind::Upstream,
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    /// Position-independent sequence number, unique within the conversation
    pub seq: u64,
    pub role: Role,
    /// Everything received for this turn; only ever grows
    pub raw_content: String,
    pub display_content: String,
    pub content_type: ContentType,
    /// Reasoning caption, assistant turns only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Segmentation phase, assistant turns only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<TurnPhase>,
    /// Set only on synthetic error turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl Turn {
    pub fn user(seq: u64, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            seq,
            role: Role::User,
            display_content: text.clone(),
            raw_content: text,
            content_type: ContentType::Text,
            reasoning: None,
            phase: None,
            error_kind: None,
        }
    }

    /// Empty assistant turn awaiting its first delta
    pub fn assistant(seq: u64) -> Self {
        Self {
            seq,
            role: Role::Assistant,
            raw_content: String::new(),
            display_content: String::new(),
            content_type: ContentType::Text,
            reasoning: None,
            phase: Some(TurnPhase::AwaitingClose),
            error_kind: None,
        }
    }

    pub fn error(seq: u64, kind: ErrorKind) -> Self {
        Self {
            seq,
            role: Role::Assistant,
            raw_content: ERROR_TURN_TEXT.to_string(),
            display_content: ERROR_TURN_TEXT.to_string(),
            content_type: ContentType::Text,
            reasoning: None,
            phase: None,
            error_kind: Some(kind),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_kind.is_some()
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Request cycle state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input
    #[default]
    Idle,

    /// Request sent, no delta received yet
    AwaitingResponse,

    /// Last turn is the in-progress assistant turn
    Streaming {
        #[serde(skip)]
        tracker: SegmentTracker,
    },
}

/// Ordered turns plus the state of the current request cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
    pub state: ConvState,
    #[serde(skip)]
    pub(crate) next_seq: u64,
}

impl Conversation {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            turns: Vec::new(),
            state: ConvState::Idle,
            next_seq: 0,
        }
    }

    /// Check if a response is being awaited or streamed
    pub fn is_working(&self) -> bool {
        !matches!(self.state, ConvState::Idle)
    }

    /// The turn currently being replaced in place, if any
    pub fn in_progress(&self) -> Option<&Turn> {
        match self.state {
            ConvState::Streaming { .. } => self.turns.last(),
            _ => None,
        }
    }

    /// Message history for the model: every real turn, raw content included
    pub fn history(&self) -> Vec<LlmMessage> {
        self.turns
            .iter()
            .filter(|turn| !turn.is_error())
            .map(|turn| match turn.role {
                Role::User => LlmMessage::user(turn.raw_content.clone()),
                Role::Assistant => LlmMessage::assistant(turn.raw_content.clone()),
            })
            .collect()
    }

    pub(crate) fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

// ============================================================================
// Context
// ============================================================================

/// Context for a conversation (immutable configuration)
#[derive(Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    pub model_id: String,
    pub markers: MarkerPair,
    pub renderer: Arc<dyn Renderer>,
}

impl ConvContext {
    pub fn new(
        conversation_id: impl Into<String>,
        model_id: impl Into<String>,
        markers: MarkerPair,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            model_id: model_id.into(),
            markers,
            renderer,
        }
    }
}

impl fmt::Debug for ConvContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvContext")
            .field("conversation_id", &self.conversation_id)
            .field("model_id", &self.model_id)
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}
