//! Runtime for executing conversations
//!
//! Each conversation is owned by one task that applies events in order, so
//! buffer mutation and snapshot publication never interleave with readers.

mod executor;
pub mod traits;


pub use executor::ConversationRuntime;
pub use traits::*;

use crate::render::Renderer;
use crate::segmenter::MarkerPair;
use crate::state_machine::{ConvContext, Conversation, Event};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

/// Conversations nobody watches are dropped after this long (30 minutes)
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Cleanup check interval (60 seconds)
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = ConversationRuntime<Arc<dyn LlmClient>>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Conversation runtime stopped: {0}")]
    Stopped(String),
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        conversation: Conversation,
        agent_working: bool,
    },
    Conversation {
        conversation: Conversation,
    },
    TurnDone,
    Error {
        message: String,
    },
}

/// Handle to interact with a running conversation
///
/// The runtime task lives as long as some handle does.
#[derive(Clone)]
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub snapshot_rx: watch::Receiver<Conversation>,
    last_activity: Arc<StdMutex<Instant>>,
}

impl ConversationHandle {
    /// Latest published state of the conversation
    pub fn snapshot(&self) -> Conversation {
        self.snapshot_rx.borrow().clone()
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    fn idle_for(&self, now: Instant) -> Duration {
        self.last_activity
            .lock()
            .map_or(Duration::ZERO, |last| now.duration_since(*last))
    }

    fn has_subscribers(&self) -> bool {
        self.broadcast_tx.receiver_count() > 0
    }
}

/// Held by an SSE connection; releases the conversation when the last one goes
pub struct SubscriberGuard {
    manager: Weak<RuntimeManager>,
    conversation_id: String,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let conversation_id = std::mem::take(&mut self.conversation_id);
        // Runs after the connection's receiver is gone
        rt.spawn(async move {
            manager.release_if_unwatched(&conversation_id).await;
        });
    }
}

/// Manager for all conversation runtimes
pub struct RuntimeManager {
    llm_client: Arc<dyn LlmClient>,
    markers: MarkerPair,
    renderer: Arc<dyn Renderer>,
    runtimes: RwLock<HashMap<String, ConversationHandle>>,
}

impl RuntimeManager {
    pub fn new(
        llm_client: Arc<dyn LlmClient>,
        markers: MarkerPair,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            llm_client,
            markers,
            renderer,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Start a runtime for a new, empty conversation
    pub async fn create(&self) -> ConversationHandle {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        let conversation = Conversation::new(&conversation_id, Utc::now());
        let context = ConvContext::new(
            &conversation_id,
            self.llm_client.model_id(),
            self.markers.clone(),
            self.renderer.clone(),
        );

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(conversation.clone());

        let runtime: ProductionRuntime = ConversationRuntime::new(
            context,
            conversation,
            self.llm_client.clone(),
            event_rx,
            event_tx.downgrade(),
            snapshot_tx,
            broadcast_tx.clone(),
        );

        let conv_id = conversation_id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(conv_id = %conv_id, "Conversation runtime finished");
        });

        let handle = ConversationHandle {
            event_tx,
            broadcast_tx,
            snapshot_rx,
            last_activity: Arc::new(StdMutex::new(Instant::now())),
        };

        self.runtimes
            .write()
            .await
            .insert(conversation_id, handle.clone());

        handle
    }

    /// Get the handle of a running conversation
    pub async fn get(&self, conversation_id: &str) -> Result<ConversationHandle, RuntimeError> {
        let handle = self
            .runtimes
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| RuntimeError::ConversationNotFound(conversation_id.to_string()))?;
        handle.touch();
        Ok(handle)
    }

    /// Send an event to a conversation
    pub async fn send_event(&self, conversation_id: &str, event: Event) -> Result<(), RuntimeError> {
        let handle = self.get(conversation_id).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::Stopped(conversation_id.to_string()))
    }

    /// Subscribe to conversation updates, starting from the current snapshot
    pub async fn subscribe(
        &self,
        conversation_id: &str,
    ) -> Result<(Conversation, broadcast::Receiver<SseEvent>), RuntimeError> {
        let handle = self.get(conversation_id).await?;
        // Subscribe first so no update between the two calls is lost
        let rx = handle.broadcast_tx.subscribe();
        Ok((handle.snapshot(), rx))
    }

    /// Guard to hold for the lifetime of a subscription
    pub fn subscriber_guard(self: &Arc<Self>, conversation_id: &str) -> SubscriberGuard {
        SubscriberGuard {
            manager: Arc::downgrade(self),
            conversation_id: conversation_id.to_string(),
        }
    }

    /// Drop a conversation once no client is subscribed to it.
    ///
    /// Removing the last handle ends its runtime, which abandons any
    /// response still streaming.
    pub async fn release_if_unwatched(&self, conversation_id: &str) {
        let mut runtimes = self.runtimes.write().await;
        if runtimes
            .get(conversation_id)
            .is_some_and(|handle| !handle.has_subscribers())
        {
            runtimes.remove(conversation_id);
            tracing::info!(conv_id = %conversation_id, "Last subscriber left, closing conversation");
        }
    }

    /// Drop unwatched conversations with no activity for `idle_timeout`
    pub async fn cleanup_idle(&self, idle_timeout: Duration) {
        let now = Instant::now();
        let mut runtimes = self.runtimes.write().await;
        runtimes.retain(|conv_id, handle| {
            let keep = handle.has_subscribers() || handle.idle_for(now) <= idle_timeout;
            if !keep {
                tracing::info!(conv_id = %conv_id, "Cleaning up idle conversation");
            }
            keep
        });
    }

    /// Start the background idle cleanup task
    pub fn start_cleanup(self: &Arc<Self>) {
        // Weak reference so the task ends with the manager
        let manager_weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                if let Some(manager) = manager_weak.upgrade() {
                    manager.cleanup_idle(IDLE_TIMEOUT).await;
                } else {
                    tracing::debug!("RuntimeManager dropped, cleanup task exiting");
                    break;
                }
            }
        });
    }

    pub fn model_id(&self) -> &str {
        self.llm_client.model_id()
    }

    pub fn markers(&self) -> &MarkerPair {
        &self.markers
    }
}
