//! Runtime for executing sessions
//!
//! One task per session owns its state and transcript; everything reaches
//! it through an event channel, so session state is never mutated
//! concurrently even when HTTP handlers race.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::{SessionRuntime, SessionSnapshot};

use crate::backend::Backend;
use crate::config::Config;
use crate::identity::{self, SessionDefaults};
use crate::session::{ConsentMode, Event, Phase, SessionContext};
use crate::transcript::Turn;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// First event on every stream: session info plus a transcript snapshot
    Init {
        session: serde_json::Value,
        turns: Vec<Turn>,
        phase: Phase,
    },
    /// A turn was appended to the transcript
    Turn { turn: Turn },
    /// The full reply text, for incremental reveal by the client
    StreamingReply { text: String },
    PhaseChange { phase: Phase },
    /// Consent was declined; carries the fixed advisory
    ConsentAdvisory { message: String },
    /// An action was rejected against the current phase
    UsageError { message: String },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub context: SessionContext,
    pub started_at: DateTime<Utc>,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Current state and transcript, as last published by the runtime
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub async fn send_event(&self, event: Event) -> Result<(), String> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }
}

/// Manager for all session runtimes
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    max_turns: usize,
    consent_mode: ConsentMode,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            max_turns: config.max_turns,
            consent_mode: config.consent_mode,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve identity from bootstrap parameters and return the running
    /// session for it, spawning one if needed.
    ///
    /// A `sid` already in the map addresses the existing session as-is;
    /// its identifiers are immutable, so a different `iid` in the
    /// parameters does not touch it.
    pub async fn get_or_create(&self, params: &HashMap<String, String>) -> SessionHandle {
        let identity = identity::resolve(params, &SessionDefaults::generate());

        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(&identity.session_id) {
                return handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock; another handler may have won
        if let Some(handle) = sessions.get(&identity.session_id) {
            return handle.clone();
        }

        let context = SessionContext::new(identity, self.max_turns, self.consent_mode);
        tracing::info!(
            session_id = %context.session_id,
            interview_id = %context.interview_id,
            "Starting session"
        );

        let handle = SessionRuntime::spawn(context, self.backend.clone());
        sessions.insert(handle.context.session_id.clone(), handle.clone());
        handle
    }

    /// Look up a running session without creating one
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }
}
