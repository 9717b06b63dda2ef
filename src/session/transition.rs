//! Pure state transition function
//!
//! Given the same state, context, transcript, and event, `transition`
//! always produces the same outputs, with no I/O side effects. The
//! runtime executes the returned effects.

use super::{Effect, Event, SessionContext, SessionState};
use crate::transcript::Transcript;
use thiserror::Error;

/// Messages that end the session when sent as the entire (trimmed,
/// case-folded) user message
pub const TERMINATION_KEYWORDS: [&str; 3] = ["stop", "end", "quit"];

/// Assistant turn shown in place of a reply when the backend call fails
pub const FALLBACK_REPLY: &str = "There was an error reaching the server. Please try again.";

/// Advisory shown once when consent is declined
pub const CONSENT_DECLINED_ADVISORY: &str =
    "You declined to participate. This session will not continue.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Usage errors: the event is valid in general but not against the
/// current phase. Recovered locally; never a system failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("consent has not been given yet")]
    ConsentRequired,
    #[error("consent was declined; start a new session to continue")]
    ConsentDeclined,
    #[error("session has ended; reset to start a new conversation")]
    SessionEnded,
    #[error("a reply is still pending; wait for it to finish")]
    ReplyPending,
    #[error("message is empty")]
    EmptyMessage,
    #[error("invalid transition: {0}")]
    Invalid(String),
}

/// Pure transition function
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    transcript: &Transcript,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Consent gate
        // ============================================================

        // AwaitingConsent + grant -> Idle
        (SessionState::AwaitingConsent, Event::ConsentGranted) => {
            Ok(TransitionResult::new(SessionState::Idle).with_effect(Effect::NotifyPhase {
                phase: SessionState::Idle.phase(),
            }))
        }

        // AwaitingConsent + deny -> ConsentDeclined (permanent)
        (SessionState::AwaitingConsent, Event::ConsentDenied) => {
            Ok(TransitionResult::new(SessionState::ConsentDeclined)
                .with_effect(Effect::ConsentAdvisory)
                .with_effect(Effect::NotifyPhase {
                    phase: SessionState::ConsentDeclined.phase(),
                }))
        }

        // A repeat decision after either outcome is a silent no-op, so
        // duplicate UI events can't flip or error the gate
        (_, Event::ConsentGranted | Event::ConsentDenied) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // User message handling
        // ============================================================

        (SessionState::Idle, Event::UserMessage { text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            Ok(TransitionResult::new(SessionState::AwaitingBackend {
                user_text: text.clone(),
            })
            // Append before the call, so the message is visible even if
            // the call fails or is slow
            .with_effect(Effect::append_user(text.clone()))
            .with_effect(Effect::CallBackend { message: text }))
        }

        (SessionState::AwaitingConsent, Event::UserMessage { .. }) => {
            Err(TransitionError::ConsentRequired)
        }
        (SessionState::ConsentDeclined, Event::UserMessage { .. }) => {
            Err(TransitionError::ConsentDeclined)
        }
        (SessionState::Ended, Event::UserMessage { .. }) => Err(TransitionError::SessionEnded),
        (SessionState::AwaitingBackend { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::ReplyPending)
        }

        // ============================================================
        // Backend reply: complete the exchange, then re-evaluate phase
        // ============================================================

        (SessionState::AwaitingBackend { user_text }, Event::BackendReply { result }) => {
            let reply = match result {
                Ok(text) => text,
                // The classified detail is logged by the runtime; only
                // the fixed fallback reaches the participant
                Err(_) => FALLBACK_REPLY.to_string(),
            };

            // The user turn is already in the transcript; the assistant
            // turn appended below completes the exchange
            let turns_after_exchange = transcript.len() + 1;

            let ended = is_termination_keyword(user_text)
                || turns_after_exchange >= context.max_turns;
            let new_state = if ended {
                SessionState::Ended
            } else {
                SessionState::Idle
            };
            let phase = new_state.phase();

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::append_assistant(reply.clone()))
                .with_effect(Effect::StreamReply { text: reply })
                .with_effect(Effect::NotifyPhase { phase }))
        }

        // ============================================================
        // Reset: clear the transcript, re-enter Active directly.
        // Consent, once granted, is not re-asked.
        // ============================================================

        (SessionState::Idle | SessionState::Ended, Event::Reset) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::ClearTranscript)
                .with_effect(Effect::NotifyPhase {
                    phase: SessionState::Idle.phase(),
                }))
        }

        // Reset before consent is decided is a no-op
        (SessionState::AwaitingConsent | SessionState::ConsentDeclined, Event::Reset) => {
            Ok(TransitionResult::new(state.clone()))
        }

        (SessionState::AwaitingBackend { .. }, Event::Reset) => Err(TransitionError::ReplyPending),

        // ============================================================
        // Invalid transitions (stale backend replies, etc.)
        // ============================================================

        (state, event) => Err(TransitionError::Invalid(format!(
            "no transition from {state:?} with event {event:?}"
        ))),
    }
}

/// Whole-message keyword match: trimmed and case-folded, so " Stop "
/// ends the session but "please stop" does not
fn is_termination_keyword(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    TERMINATION_KEYWORDS.contains(&normalized.as_str())
}
