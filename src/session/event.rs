//! Events that can occur in a session

use crate::backend::BackendError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Consent events
    ConsentGranted,
    ConsentDenied,

    // User events
    UserMessage { text: String },

    /// The in-flight backend call resolved, one way or the other
    BackendReply {
        result: Result<String, BackendError>,
    },

    /// Clear the transcript and start the dialogue over
    Reset,
}
