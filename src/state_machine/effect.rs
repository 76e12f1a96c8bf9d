//! Effects produced by state transitions

use crate::llm::LlmMessage;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a streaming chat request with the full history
    RequestLlm { messages: Vec<LlmMessage> },

    /// Push the new conversation snapshot to connected clients
    PublishConversation,

    /// The assistant turn finished streaming
    NotifyTurnDone,

    /// The request cycle failed
    NotifyError { message: String },
}

impl Effect {
    pub fn request_llm(messages: Vec<LlmMessage>) -> Self {
        Effect::RequestLlm { messages }
    }

    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::NotifyError {
            message: message.into(),
        }
    }
}
