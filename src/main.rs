//! Think Chat - local LLM chat server
//!
//! Streams replies from an Ollama model server and splits each reply into
//! the model's reasoning and its rendered final answer.

mod api;
mod config;
mod llm;
mod render;
mod runtime;
mod segmenter;
mod state_machine;
mod stream;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{LoggingService, OllamaService};
use render::MarkdownRenderer;
use runtime::{RuntimeManager, ServiceLlmClient};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "think_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env();

    // Initialize model client
    let ollama = OllamaService::new(&config.ollama_url, config.model.clone())?;
    let service = Arc::new(LoggingService::new(Arc::new(ollama)));
    let llm_client = Arc::new(ServiceLlmClient::new(service));

    tracing::info!(
        url = %config.ollama_url,
        model = %config.model,
        open_marker = %config.markers.open,
        close_marker = %config.markers.close,
        "Model client initialized"
    );

    // Create application state
    let manager = RuntimeManager::new(llm_client, config.markers.clone(), Arc::new(MarkdownRenderer));
    let state = AppState::new(manager);
    state.runtime.start_cleanup();

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.addr();
    tracing::info!("Think Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
