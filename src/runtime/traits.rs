//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{ByteStream, LlmError, LlmRequest, LlmService};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for opening streaming chat requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Open a streaming chat request
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ByteStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ByteStream, LlmError> {
        (**self).stream_chat(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an `LlmService` as `LlmClient`
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ByteStream, LlmError> {
        self.service.stream_chat(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}
