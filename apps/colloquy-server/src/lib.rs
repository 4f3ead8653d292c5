//! HTTP surface for the Colloquy service.
//!
//! Routes mirror the front-end contract: create a conversation, submit a
//! user turn, then open the SSE stream and read `token` / `tool` /
//! `safety` / `done` named events until `done` arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_stream::stream;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use colloquy_core::StreamEvent;
use colloquy_runtime::{SessionError, SessionService};

#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionService>,
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    text: String,
    /// Optional credential stored as the conversation's override
    key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConversationView {
    id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Build the application router
pub fn router(sessions: Arc<SessionService>) -> Router {
    // Permissive CORS: the reference deployment serves a browser front-end
    // from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/conversations", post(create_conversation))
        .route("/conversations/{conversation}", get(get_conversation))
        .route("/conversations/{conversation}/messages", post(submit_message))
        .route("/conversations/{conversation}/stream", get(stream_response))
        .layer(cors)
        .with_state(AppState { sessions })
}

/// Bind and serve until shutdown
pub async fn run_server(sessions: Arc<SessionService>, listen: SocketAddr) -> anyhow::Result<()> {
    let app = router(sessions);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("bind server listener failed")?;
    println!("colloquy-server listening on http://{}", listen);
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status":"ok"}))
}

async fn create_conversation(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let conversation = state
        .sessions
        .create_conversation()
        .await
        .map_err(map_session_error)?;
    Ok(Json(ConversationView {
        id: conversation.id,
        created_at: conversation.created_at,
    }))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let view = state
        .sessions
        .conversation(&conversation)
        .await
        .map_err(map_session_error)?;
    let turns = state
        .sessions
        .history(&conversation)
        .await
        .map_err(map_session_error)?;
    Ok(Json(serde_json::json!({
        "id": view.id,
        "created_at": view.created_at,
        "turns": turns,
    })))
}

async fn submit_message(
    State(state): State<AppState>,
    Path(conversation): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state
        .sessions
        .submit_user_turn(&conversation, &payload.text, payload.key.as_deref())
        .await
        .map_err(map_session_error)?;
    Ok(Json(serde_json::json!({"status":"ok"})))
}

async fn stream_response(
    State(state): State<AppState>,
    Path(conversation): Path<String>,
) -> Result<
    Sse<impl futures_util::Stream<Item = Result<SseEvent, std::convert::Infallible>>>,
    (StatusCode, Json<ErrorBody>),
> {
    let mut rx = state
        .sessions
        .stream_response(&conversation)
        .await
        .map_err(map_session_error)?;

    let event_stream = stream! {
        while let Some(event) = rx.recv().await {
            let done = matches!(event, StreamEvent::Done);
            yield Ok(sse_event(&event));
            if done {
                break;
            }
        }
    };

    Ok(Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keepalive"),
    ))
}

fn sse_event(event: &StreamEvent) -> SseEvent {
    match event {
        StreamEvent::Token { text } => SseEvent::default().event("token").data(text.clone()),
        StreamEvent::Tool { trace } => SseEvent::default().event("tool").data(
            serde_json::to_string(trace).unwrap_or_else(|_| "{}".to_string()),
        ),
        StreamEvent::Safety { verdict } => SseEvent::default().event("safety").data(
            serde_json::to_string(verdict).unwrap_or_else(|_| "{}".to_string()),
        ),
        StreamEvent::Done => SseEvent::default().event("done").data("[DONE]"),
    }
}

fn map_session_error(err: SessionError) -> (StatusCode, Json<ErrorBody>) {
    let (status, code) = match &err {
        SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SessionError::NoPendingUserTurn => (StatusCode::BAD_REQUEST, "no_pending_user_turn"),
        SessionError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
