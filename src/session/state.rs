//! Session state types

use crate::identity::SessionIdentity;
use serde::{Deserialize, Serialize};

/// Default turn budget, user and assistant turns combined
pub const DEFAULT_MAX_TURNS: usize = 200;

/// How consent is collected before the first message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentMode {
    /// A pre-chat consent decision is required before input is accepted
    #[default]
    Explicit,
    /// An advisory banner is shown; continuing implies consent
    Banner,
}

/// The participant's consent decision, set at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    Undecided,
    Granted,
    Denied,
}

/// Macro phase of a session, as presented to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingConsent,
    Active,
    Ended,
}

/// Fine-grained session state.
///
/// The wire-facing [`Phase`] and [`ConsentState`] views are derived from
/// this; the extra variants track consent refusal and the in-flight
/// backend call, which the macro phase deliberately hides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Consent undecided; no input accepted
    AwaitingConsent,

    /// Consent denied; permanently blocked short of a whole new session
    ConsentDeclined,

    /// Ready for the next user message
    Idle,

    /// Backend call in flight for `user_text`; input rejected until it
    /// resolves
    AwaitingBackend { user_text: String },

    /// Keyword or turn-budget termination; only reset leaves this
    Ended,
}

impl SessionState {
    /// Starting state for a fresh session
    pub fn initial(mode: ConsentMode) -> Self {
        match mode {
            ConsentMode::Explicit => SessionState::AwaitingConsent,
            ConsentMode::Banner => SessionState::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            SessionState::AwaitingConsent | SessionState::ConsentDeclined => Phase::AwaitingConsent,
            SessionState::Idle | SessionState::AwaitingBackend { .. } => Phase::Active,
            SessionState::Ended => Phase::Ended,
        }
    }

    pub fn consent(&self) -> ConsentState {
        match self {
            SessionState::AwaitingConsent => ConsentState::Undecided,
            SessionState::ConsentDeclined => ConsentState::Denied,
            SessionState::Idle | SessionState::AwaitingBackend { .. } | SessionState::Ended => {
                ConsentState::Granted
            }
        }
    }

    /// Check whether a user message would currently be accepted
    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

/// Immutable configuration for one session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub interview_id: String,
    /// Total turn budget; the session ends once the transcript reaches it
    pub max_turns: usize,
    pub consent_mode: ConsentMode,
}

impl SessionContext {
    pub fn new(identity: SessionIdentity, max_turns: usize, consent_mode: ConsentMode) -> Self {
        Self {
            session_id: identity.session_id,
            interview_id: identity.interview_id,
            max_turns,
            consent_mode,
        }
    }
}
