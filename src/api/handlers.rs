//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, RenameRequest, StatusResponse, SuccessResponse,
    ThreadListResponse,
};
use super::AppState;
use crate::db::{DbError, Thread};
use crate::flows::APOLOGY_REPLY;
use crate::runtime::{Invocation, RouterError};
use crate::state_machine::{now_timestamp, ConversationState, Role};
use crate::title_generator::title_for;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/chat", post(chat))
        .route("/history", get(list_threads))
        .route("/history/:thread_id", get(get_thread).delete(delete_thread))
        .route("/history/:thread_id/rename", put(rename_thread))
        .with_state(state)
}

async fn read_root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "HCMUT Chatbot API is running",
    })
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let thread_id = req
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info!(thread_id = %thread_id, "Chat turn received");

    let output = match state
        .router
        .invoke(&thread_id, Invocation::user_turn(req.message))
        .await
    {
        Ok(output) => output,
        Err(RouterError::Classification(message)) => {
            tracing::error!(thread_id = %thread_id, error = %message, "Turn aborted");
            return Ok(Json(apology(thread_id)));
        }
        Err(RouterError::EmptyInput) => {
            return Err(AppError::BadRequest("Message cannot be empty".to_string()));
        }
        Err(e) => {
            tracing::error!(thread_id = %thread_id, error = %e, "Turn failed");
            return Err(AppError::Internal(e.to_string()));
        }
    };

    spawn_title_generation(&state, &thread_id, &output.state);

    let Some(reply) = output.ai_reply else {
        tracing::warn!(thread_id = %thread_id, "Turn completed without a reply");
        return Ok(Json(apology(thread_id)));
    };

    Ok(Json(ChatResponse {
        content: reply.content,
        thread_id,
        timestamp: reply.timestamp,
        sources: reply.sources,
    }))
}

fn apology(thread_id: String) -> ChatResponse {
    ChatResponse {
        content: APOLOGY_REPLY.to_string(),
        thread_id,
        timestamp: now_timestamp(),
        sources: None,
    }
}

/// Name an untitled thread after its first user message, off the request path
fn spawn_title_generation(state: &AppState, thread_id: &str, conversation: &ConversationState) {
    match state.db.has_title(thread_id) {
        Ok(false) => {}
        Ok(true) => return,
        Err(e) => {
            tracing::warn!(thread_id = %thread_id, error = %e, "Could not check thread title");
            return;
        }
    }
    let Some(first_message) = conversation
        .messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
    else {
        return;
    };

    let db = state.db.clone();
    let llm = state.llm_registry.get_cheap_model();
    let thread_id = thread_id.to_string();
    tokio::spawn(async move {
        let title = title_for(&first_message, llm).await;
        match db.set_title_if_missing(&thread_id, &title) {
            Ok(true) => tracing::info!(thread_id = %thread_id, title = %title, "Thread titled"),
            Ok(false) => {}
            Err(e) => tracing::warn!(thread_id = %thread_id, error = %e, "Failed to store title"),
        }
    });
}

// ============================================================
// History
// ============================================================

async fn list_threads(State(state): State<AppState>) -> Result<Json<ThreadListResponse>, AppError> {
    let threads = state.db.list_threads()?;
    Ok(Json(ThreadListResponse { threads }))
}

async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Thread>, AppError> {
    Ok(Json(state.db.get_thread(&thread_id)?))
}

async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .router
        .delete(&thread_id, || state.db.delete_thread(&thread_id))
        .await?;
    tracing::info!(thread_id = %thread_id, "Thread deleted");
    Ok(Json(SuccessResponse { success: true }))
}

async fn rename_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let title = req.new_title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".to_string()));
    }
    state.db.rename_thread(&thread_id, title)?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ThreadNotFound(_) => AppError::NotFound(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
