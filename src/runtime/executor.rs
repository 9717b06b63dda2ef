//! Session runtime executor

use super::{SessionEvent, SessionHandle};
use crate::backend::Backend;
use crate::session::{
    transition, ConsentState, Effect, Event, Phase, SessionContext, SessionState, TransitionError,
    CONSENT_DECLINED_ADVISORY,
};
use crate::transcript::Transcript;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Read-only view of a session, published after every processed event.
///
/// HTTP read paths and pre-flight checks borrow this instead of touching
/// the runtime's own state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub transcript: Transcript,
}

impl SessionSnapshot {
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn consent(&self) -> ConsentState {
        self.state.consent()
    }
}

/// Runtime that owns one session's state and transcript.
///
/// Events arrive on the mpsc channel and run through the pure transition
/// function; the backend call is the only suspension and is spawned off,
/// resolving back into the same channel as a `BackendReply` event.
pub struct SessionRuntime<B: Backend + ?Sized + 'static> {
    context: SessionContext,
    state: SessionState,
    transcript: Transcript,
    backend: Arc<B>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<B: Backend + ?Sized + 'static> SessionRuntime<B> {
    /// Spawn a runtime task for `context` and return the handle to it
    pub fn spawn(context: SessionContext, backend: Arc<B>) -> SessionHandle {
        let state = SessionState::initial(context.consent_mode);
        let transcript = Transcript::new();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            state: state.clone(),
            transcript: transcript.clone(),
        });

        let handle = SessionHandle {
            context: context.clone(),
            started_at: chrono::Utc::now(),
            event_tx: event_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            snapshot_rx,
        };

        let runtime = Self {
            context,
            state,
            transcript,
            backend,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
        };

        tokio::spawn(async move {
            runtime.run().await;
        });

        handle
    }

    async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Session runtime started");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        match transition(&self.state, &self.context, &self.transcript, event) {
            Ok(result) => {
                self.state = result.new_state;
                for effect in result.effects {
                    self.execute_effect(effect);
                }
                self.publish_snapshot();
            }

            // Stale events (e.g. a reply landing after a concurrent state
            // change) are dropped; nothing user-facing happened
            Err(TransitionError::Invalid(detail)) => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    detail = %detail,
                    "Dropping stale event"
                );
            }

            // Usage errors go back to connected clients so input can be
            // disabled; the session itself is untouched
            Err(e) => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    error = %e,
                    "Rejected event against current phase"
                );
                let _ = self.broadcast_tx.send(SessionEvent::UsageError {
                    message: e.to_string(),
                });
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendTurn { turn } => {
                self.transcript.append(turn.clone());
                let _ = self.broadcast_tx.send(SessionEvent::Turn { turn });
            }

            Effect::CallBackend { message } => {
                let backend = self.backend.clone();
                let event_tx = self.event_tx.clone();
                let session_id = self.context.session_id.clone();
                let interview_id = self.context.interview_id.clone();

                tokio::spawn(async move {
                    let result = backend.send(&session_id, &interview_id, &message).await;

                    if let Err(e) = &result {
                        tracing::warn!(
                            session_id = %session_id,
                            status = ?e.status(),
                            detail = %e.detail(),
                            "Backend call failed; substituting fallback reply"
                        );
                    }

                    // Feed the outcome back through the event channel so
                    // state mutation stays on the runtime task
                    let _ = event_tx.send(Event::BackendReply { result }).await;
                });
            }

            Effect::ClearTranscript => {
                self.transcript.clear();
            }

            Effect::StreamReply { text } => {
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::StreamingReply { text });
            }

            Effect::NotifyPhase { phase } => {
                let _ = self.broadcast_tx.send(SessionEvent::PhaseChange { phase });
            }

            Effect::ConsentAdvisory => {
                let _ = self.broadcast_tx.send(SessionEvent::ConsentAdvisory {
                    message: CONSENT_DECLINED_ADVISORY.to_string(),
                });
            }
        }
    }

    fn publish_snapshot(&self) {
        let _ = self.snapshot_tx.send(SessionSnapshot {
            state: self.state.clone(),
            transcript: self.transcript.clone(),
        });
    }
}
