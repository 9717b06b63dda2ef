//! API request and response types

use crate::runtime::SessionHandle;
use crate::session::{ConsentMode, ConsentState, Phase};
use crate::transcript::Turn;
use serde::{Deserialize, Serialize};

/// Request to send a user message
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Request carrying a consent decision
#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub decision: ConsentDecision,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentDecision {
    Grant,
    Deny,
}

/// Session metadata as presented to clients
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub interview_id: String,
    pub phase: Phase,
    pub consent_state: ConsentState,
    pub consent_mode: ConsentMode,
    pub max_turns: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Bootstrap link that re-attaches to this session
    pub share_link: String,
}

impl SessionInfo {
    pub fn from_handle(handle: &SessionHandle) -> Self {
        let snapshot = handle.snapshot();
        Self {
            session_id: handle.context.session_id.clone(),
            interview_id: handle.context.interview_id.clone(),
            phase: snapshot.phase(),
            consent_state: snapshot.consent(),
            consent_mode: handle.context.consent_mode,
            max_turns: handle.context.max_turns,
            started_at: handle.started_at,
            share_link: format!(
                "/?sid={}&iid={}",
                handle.context.session_id, handle.context.interview_id
            ),
        }
    }
}

/// Response with session metadata
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionInfo,
}

/// Response with session metadata and the transcript
#[derive(Debug, Serialize)]
pub struct SessionWithTranscriptResponse {
    pub session: SessionInfo,
    pub turns: Vec<Turn>,
}

/// Response for message submission
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for consent and reset actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub ok: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
