//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ConversationResponse, ErrorResponse, ModelResponse};
use super::AppState;
use crate::runtime::{RuntimeError, SseEvent};
use crate::state_machine::Event;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the SPA
        .route("/", get(serve_spa))
        // Static assets
        .route("/assets/*path", get(serve_static))
        // Conversations
        .route("/api/conversations/new", post(create_conversation))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/stream", get(stream_conversation))
        .route("/api/conversations/:id/chat", post(send_chat))
        // Model info
        .route("/api/model", get(get_model))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// SPA Handler
// ============================================================

async fn serve_spa() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Conversations
// ============================================================

async fn create_conversation(State(state): State<AppState>) -> Json<ConversationResponse> {
    let handle = state.runtime.create().await;
    let conversation = handle.snapshot();
    tracing::info!(conv_id = %conversation.id, "Created conversation");

    Json(ConversationResponse {
        agent_working: conversation.is_working(),
        conversation,
    })
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state.runtime.get(&id).await?.snapshot();

    Ok(Json(ConversationResponse {
        agent_working: conversation.is_working(),
        conversation,
    }))
}

async fn stream_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (conversation, broadcast_rx) = state.runtime.subscribe(&id).await?;
    let guard = state.runtime.subscriber_guard(&id);

    let init = SseEvent::Init {
        agent_working: conversation.is_working(),
        conversation,
    };

    Ok(sse_stream(init, broadcast_rx, guard))
}

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let handle = state.runtime.get(&id).await?;

    if req.text.trim().is_empty() {
        return Ok(Json(ChatResponse { queued: false }));
    }
    if handle.snapshot().is_working() {
        return Err(AppError::Conflict(
            "A response is still streaming, wait for it to finish".to_string(),
        ));
    }

    state
        .runtime
        .send_event(&id, Event::UserMessage { text: req.text })
        .await?;

    Ok(Json(ChatResponse { queued: true }))
}

// ============================================================
// Model info
// ============================================================

async fn get_model(State(state): State<AppState>) -> Json<ModelResponse> {
    Json(ModelResponse {
        model: state.runtime.model_id().to_string(),
        markers: state.runtime.markers().clone(),
    })
}

async fn get_version() -> impl IntoResponse {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::ConversationNotFound(_) => AppError::NotFound(e.to_string()),
            RuntimeError::Stopped(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
