//! Server-Sent Events support

use crate::runtime::{SseEvent, SubscriberGuard};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
    guard: SubscriberGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(init_event)) });

    // Every update carries the full conversation, so a lagged client
    // catches up on the next one. The guard goes when the client does.
    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| {
        let _subscribed = &guard;
        match result {
            Ok(event) => Some(Ok(sse_event_to_axum(event))),
            Err(_) => None,
        }
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = match event {
        SseEvent::Init {
            conversation,
            agent_working,
        } => (
            "init",
            json!({
                "type": "init",
                "conversation": conversation,
                "agent_working": agent_working
            }),
        ),
        SseEvent::Conversation { conversation } => (
            "conversation",
            json!({
                "type": "conversation",
                "conversation": conversation
            }),
        ),
        SseEvent::TurnDone => (
            "turn_done",
            json!({
                "type": "turn_done"
            }),
        ),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
