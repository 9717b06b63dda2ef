//! Effects produced by state transitions

use super::state::Phase;
use crate::transcript::Turn;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a turn to the transcript
    AppendTurn { turn: Turn },

    /// Dispatch the message to the answering service
    CallBackend { message: String },

    /// Drop all turns (reset)
    ClearTranscript,

    /// Publish the full reply text for incremental reveal
    StreamReply { text: String },

    /// Tell subscribers the session phase (possibly) changed
    NotifyPhase { phase: Phase },

    /// Surface the fixed consent-declined advisory
    ConsentAdvisory,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::user(text),
        }
    }

    pub fn append_assistant(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::assistant(text),
        }
    }
}
