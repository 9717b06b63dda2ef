//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ConsentDecision, ConsentRequest, ErrorResponse, MessageRequest, QueuedResponse, SessionInfo,
    SessionResponse, SessionWithTranscriptResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{SessionEvent, SessionHandle};
use crate::session::{Event, SessionState, TransitionError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session bootstrap from shareable-link parameters
        .route("/api/sessions/new", post(create_session))
        // Session info + transcript snapshot
        .route("/api/sessions/:id", get(get_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/message", post(send_message))
        .route("/api/sessions/:id/consent", post(decide_consent))
        .route("/api/sessions/:id/reset", post(reset_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Bootstrap
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<SessionResponse> {
    let handle = state.sessions.get_or_create(&params).await;

    Json(SessionResponse {
        session: SessionInfo::from_handle(&handle),
    })
}

// ============================================================
// Session Retrieval
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionWithTranscriptResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    let snapshot = handle.snapshot();

    Ok(Json(SessionWithTranscriptResponse {
        session: SessionInfo::from_handle(&handle),
        turns: snapshot.transcript.turns().to_vec(),
    }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = lookup(&state, &id).await?;
    let snapshot = handle.snapshot();

    // Subscribe before building the init event so no turn can fall
    // between the snapshot and the stream
    let broadcast_rx = handle.subscribe();

    let init_event = SessionEvent::Init {
        session: serde_json::to_value(SessionInfo::from_handle(&handle)).unwrap_or(Value::Null),
        turns: snapshot.transcript.turns().to_vec(),
        phase: snapshot.phase(),
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    // Whitespace-only input never reaches the state machine
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }

    let handle = lookup(&state, &id).await?;

    // Pre-flight check against the latest snapshot so callers get a
    // meaningful status code; the runtime remains the authority and
    // re-rejects anything that slips through a race
    check_accepts_input(&handle.snapshot().state)?;

    handle
        .send_event(Event::UserMessage { text: req.text })
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(QueuedResponse { queued: true }))
}

async fn decide_consent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConsentRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let handle = lookup(&state, &id).await?;

    let event = match req.decision {
        ConsentDecision::Grant => Event::ConsentGranted,
        ConsentDecision::Deny => Event::ConsentDenied,
    };

    handle.send_event(event).await.map_err(AppError::Internal)?;

    Ok(Json(SuccessResponse { ok: true }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let handle = lookup(&state, &id).await?;

    if matches!(
        handle.snapshot().state,
        SessionState::AwaitingBackend { .. }
    ) {
        return Err(AppError::Conflict(
            TransitionError::ReplyPending.to_string(),
        ));
    }

    handle
        .send_event(Event::Reset)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(SuccessResponse { ok: true }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("study-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Helpers
// ============================================================

async fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No session: {id}")))
}

fn check_accepts_input(state: &SessionState) -> Result<(), AppError> {
    let violation = match state {
        SessionState::Idle => return Ok(()),
        SessionState::AwaitingConsent => TransitionError::ConsentRequired,
        SessionState::ConsentDeclined => TransitionError::ConsentDeclined,
        SessionState::AwaitingBackend { .. } => TransitionError::ReplyPending,
        SessionState::Ended => TransitionError::SessionEnded,
    };
    Err(AppError::Conflict(violation.to_string()))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
