//! Conversation runtime executor

use super::traits::LlmClient;
use super::SseEvent;

use crate::llm::{LlmMessage, LlmRequest};
use crate::state_machine::{transition, ConvContext, Conversation, Effect, ErrorKind, Event};
use crate::stream::deltas;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Owns one conversation and applies events to it serially
pub struct ConversationRuntime<L>
where
    L: LlmClient + 'static,
{
    context: ConvContext,
    conversation: Conversation,
    llm_client: Arc<L>,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so the runtime stops once every handle is gone
    event_tx: mpsc::WeakSender<Event>,
    snapshot_tx: watch::Sender<Conversation>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Task reading the current response body
    stream_task: Option<JoinHandle<()>>,
}

impl<L> ConversationRuntime<L>
where
    L: LlmClient + 'static,
{
    pub fn new(
        context: ConvContext,
        conversation: Conversation,
        llm_client: L,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::WeakSender<Event>,
        snapshot_tx: watch::Sender<Conversation>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        Self {
            context,
            conversation,
            llm_client: Arc::new(llm_client),
            event_rx,
            event_tx,
            snapshot_tx,
            broadcast_tx,
            stream_task: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(conv_id = %self.context.conversation_id, "Starting conversation runtime");

        while let Some(event) = self.event_rx.recv().await {
            if let Err(e) = self.process_event(event) {
                tracing::warn!(conv_id = %self.context.conversation_id, error = %e, "Rejected event");
            }
        }

        // Dropping the body closes the connection to the model server
        if let Some(task) = self.stream_task.take() {
            tracing::debug!(conv_id = %self.context.conversation_id, "Abandoning in-flight response");
            task.abort();
        }

        tracing::info!(conv_id = %self.context.conversation_id, "Conversation runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), String> {
        let result = match transition(&self.conversation, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                // Transition errors are user-facing (e.g., "busy")
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: e.to_string(),
                });
                return Err(e.to_string());
            }
        };

        self.conversation = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }

        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::RequestLlm { messages } => {
                self.spawn_stream(messages);
            }
            Effect::PublishConversation => {
                self.snapshot_tx.send_replace(self.conversation.clone());
                let _ = self.broadcast_tx.send(SseEvent::Conversation {
                    conversation: self.conversation.clone(),
                });
            }
            Effect::NotifyTurnDone => {
                self.stream_task = None;
                let reply_len = self
                    .conversation
                    .turns
                    .last()
                    .map_or(0, |turn| turn.raw_content.len());
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    turns = self.conversation.turns.len(),
                    reply_bytes = reply_len,
                    "Turn complete"
                );
                let _ = self.broadcast_tx.send(SseEvent::TurnDone);
            }
            Effect::NotifyError { message } => {
                self.stream_task = None;
                tracing::warn!(
                    conv_id = %self.context.conversation_id,
                    error = %message,
                    "Turn failed"
                );
                let _ = self.broadcast_tx.send(SseEvent::Error { message });
            }
        }
    }

    fn spawn_stream(&mut self, messages: Vec<LlmMessage>) {
        let llm_client = self.llm_client.clone();
        let event_tx = self.event_tx.clone();
        let conv_id = self.context.conversation_id.clone();

        tracing::debug!(conv_id = %conv_id, messages = messages.len(), "Requesting response");

        self.stream_task = Some(tokio::spawn(async move {
            let request = LlmRequest { messages };
            let event = stream_response(llm_client.as_ref(), &request, &event_tx).await;
            if let Some(event) = event {
                forward(&event_tx, event).await;
            }
        }));
    }
}

/// Deliver an event if the runtime is still running
async fn forward(event_tx: &mpsc::WeakSender<Event>, event: Event) -> bool {
    match event_tx.upgrade() {
        Some(tx) => tx.send(event).await.is_ok(),
        None => false,
    }
}

/// Forward every delta of one response as an event.
///
/// Returns the terminal event, or `None` when the runtime has gone away.
async fn stream_response<L: LlmClient + ?Sized>(
    llm_client: &L,
    request: &LlmRequest,
    event_tx: &mpsc::WeakSender<Event>,
) -> Option<Event> {
    let body = match llm_client.stream_chat(request).await {
        Ok(body) => body,
        Err(e) => {
            return Some(Event::StreamFailed {
                error_kind: e.kind.into(),
                message: e.message,
            })
        }
    };

    let mut items = std::pin::pin!(deltas(body));
    while let Some(item) = items.next().await {
        match item {
            Ok(item) => {
                let event = Event::StreamDelta { delta: item.delta };
                if !forward(event_tx, event).await {
                    return None;
                }
                if item.done {
                    break;
                }
            }
            Err(e) => {
                return Some(Event::StreamFailed {
                    error_kind: ErrorKind::from(&e),
                    message: e.to_string(),
                })
            }
        }
    }

    Some(Event::StreamComplete)
}
