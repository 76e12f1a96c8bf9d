//! LLM provider abstraction
//!
//! Opens streaming chat requests against a locally hosted model server.

mod error;
mod ollama;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use ollama::OllamaService;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

/// Raw response body, one item per network read
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, LlmError>>;

/// Common interface for streaming chat providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Send a chat request and return the open response body.
    ///
    /// Errors here cover everything up to and including the response
    /// status; failures while reading the body surface as stream items.
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ByteStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ByteStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.stream_chat(request).await;
        let duration = start.elapsed();

        match result {
            Ok(stream) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    "LLM stream opened"
                );
                let model_id = self.model_id.clone();
                let mut bytes_read = 0usize;
                Ok(stream
                    .inspect(move |item| match item {
                        Ok(chunk) => {
                            bytes_read += chunk.len();
                            tracing::trace!(model = %model_id, bytes_read, "LLM stream chunk");
                        }
                        Err(e) => {
                            tracing::warn!(model = %model_id, error = %e.message, "LLM stream broke");
                        }
                    })
                    .boxed())
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
