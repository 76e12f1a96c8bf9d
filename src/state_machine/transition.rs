//! Pure state transition function
//!
//! Given the same conversation, context and event this always produces the
//! same result, with no I/O side effects.

use super::state::{ContentType, Conversation, ConvState, Turn};
use super::{ConvContext, Effect, Event};
use crate::segmenter::SegmentTracker;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Conversation,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Conversation) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A response is still streaming, wait for it to finish")]
    AgentBusy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    conv: &Conversation,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&conv.state, event) {
        // ============================================================
        // User Message Handling
        // ============================================================

        // Blank input changes nothing and sends nothing
        (ConvState::Idle, Event::UserMessage { text }) if text.trim().is_empty() => {
            Ok(TransitionResult::new(conv.clone()))
        }

        (ConvState::Idle, Event::UserMessage { text }) => {
            let mut next = conv.clone();
            let seq = next.take_seq();
            next.turns.push(Turn::user(seq, text.trim()));
            next.state = ConvState::AwaitingResponse;
            let messages = next.history();

            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishConversation)
                .with_effect(Effect::request_llm(messages)))
        }

        (ConvState::AwaitingResponse | ConvState::Streaming { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AgentBusy)
        }

        // ============================================================
        // Streaming
        // ============================================================

        // First delta creates the assistant turn, even when empty
        (ConvState::AwaitingResponse, Event::StreamDelta { delta }) => {
            let mut next = conv.clone();
            let seq = next.take_seq();
            let mut turn = Turn::assistant(seq);
            let mut tracker = SegmentTracker::new();
            turn.raw_content.push_str(&delta);
            refresh_assistant_turn(&mut turn, &mut tracker, context);

            next.turns.push(turn);
            next.state = ConvState::Streaming { tracker };
            Ok(TransitionResult::new(next).with_effect(Effect::PublishConversation))
        }

        (ConvState::Streaming { tracker }, Event::StreamDelta { delta }) => {
            let mut next = conv.clone();
            let mut tracker = tracker.clone();
            let Some(turn) = next.turns.last_mut() else {
                return Err(TransitionError::InvalidTransition(
                    "streaming without an assistant turn".to_string(),
                ));
            };
            turn.raw_content.push_str(&delta);
            refresh_assistant_turn(turn, &mut tracker, context);

            next.state = ConvState::Streaming { tracker };
            Ok(TransitionResult::new(next).with_effect(Effect::PublishConversation))
        }

        (ConvState::AwaitingResponse | ConvState::Streaming { .. }, Event::StreamComplete) => {
            let mut next = conv.clone();
            next.state = ConvState::Idle;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishConversation)
                .with_effect(Effect::NotifyTurnDone))
        }

        // ============================================================
        // Error Handling
        // ============================================================

        // The partial turn is abandoned; one error turn takes its place
        (
            state @ (ConvState::AwaitingResponse | ConvState::Streaming { .. }),
            Event::StreamFailed {
                message,
                error_kind,
            },
        ) => {
            let mut next = conv.clone();
            if matches!(state, ConvState::Streaming { .. }) {
                next.turns.pop();
            }
            let seq = next.take_seq();
            next.turns.push(Turn::error(seq, error_kind));
            next.state = ConvState::Idle;

            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishConversation)
                .with_effect(Effect::notify_error(message)))
        }

        (ConvState::Idle, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} with no request in flight"
        ))),
    }
}

/// Re-derive the display fields of an assistant turn from its raw buffer
fn refresh_assistant_turn(turn: &mut Turn, tracker: &mut SegmentTracker, context: &ConvContext) {
    let segmentation = tracker.update(&turn.raw_content, &context.markers);
    turn.phase = Some(segmentation.phase());
    turn.reasoning = segmentation.reasoning;

    match segmentation.final_text {
        Some(final_text) => {
            turn.display_content = context.renderer.render(&final_text);
            turn.content_type = ContentType::Html;
        }
        // Not renderable yet: show the buffer as-is
        None => {
            turn.display_content.clone_from(&turn.raw_content);
            turn.content_type = ContentType::Text;
        }
    }
}
