//! Ollama chat provider

use super::types::{ChatRequestBody, LlmRequest};
use super::{ByteStream, LlmError, LlmService};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming client for an Ollama server's `/api/chat` endpoint
pub struct OllamaService {
    client: Client,
    url: String,
    model_id: String,
}

impl OllamaService {
    pub fn new(base_url: &str, model_id: impl Into<String>) -> Result<Self, LlmError> {
        // Only connecting is bounded; a long reasoning section may stream for minutes.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model_id: model_id.into(),
        })
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ByteStream, LlmError> {
        let body = ChatRequestBody {
            model: &self.model_id,
            messages: &request.messages,
            stream: true,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &body));
        }

        Ok(response
            .bytes_stream()
            .map(|item| {
                item.map(|bytes| bytes.to_vec())
                    .map_err(|e| LlmError::from_reqwest(&e))
            })
            .boxed())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
