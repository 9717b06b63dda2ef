//! Property-based tests for the session state machine
//!
//! These tests verify the session invariants hold across all possible
//! inputs: consent gating, exchange pairing, keyword and budget
//! termination, and reset behavior.

use super::state::*;
use super::transition::*;
use super::*;
use crate::backend::BackendError;
use crate::identity::SessionIdentity;
use crate::transcript::{Role, Transcript, Turn};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(max_turns: usize, consent_mode: ConsentMode) -> SessionContext {
    SessionContext::new(
        SessionIdentity {
            session_id: "prop-session".to_string(),
            interview_id: "PART_TIME".to_string(),
        },
        max_turns,
        consent_mode,
    )
}

/// Minimal stand-in for the runtime: dispatches events through the pure
/// transition and applies transcript effects, so properties can be
/// checked over whole event sequences.
struct Harness {
    ctx: SessionContext,
    state: SessionState,
    transcript: Transcript,
}

impl Harness {
    fn new(ctx: SessionContext) -> Self {
        let state = SessionState::initial(ctx.consent_mode);
        Self {
            ctx,
            state,
            transcript: Transcript::new(),
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let result = transition(&self.state, &self.ctx, &self.transcript, event)?;
        self.state = result.new_state;
        for effect in &result.effects {
            match effect {
                Effect::AppendTurn { turn } => self.transcript.append(turn.clone()),
                Effect::ClearTranscript => self.transcript.clear(),
                _ => {}
            }
        }
        Ok(result.effects)
    }

    /// Submit a message and resolve its backend call, as the runtime
    /// would for one complete exchange
    fn exchange(
        &mut self,
        text: &str,
        result: Result<String, BackendError>,
    ) -> Result<(), TransitionError> {
        self.dispatch(Event::UserMessage {
            text: text.to_string(),
        })?;
        self.dispatch(Event::BackendReply { result })?;
        Ok(())
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_keyword_message() -> impl Strategy<Value = String> {
    (
        prop::sample::select(TERMINATION_KEYWORDS.to_vec()),
        any::<bool>(),
        " {0,3}",
        " {0,3}",
    )
        .prop_map(|(keyword, upper, left, right)| {
            let word = if upper {
                keyword.to_uppercase()
            } else {
                keyword.to_string()
            };
            format!("{left}{word}{right}")
        })
}

fn arb_plain_message() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 ]{0,30}".prop_filter("must not be a termination keyword", |text| {
        let normalized = text.trim().to_lowercase();
        !normalized.is_empty() && !TERMINATION_KEYWORDS.contains(&normalized.as_str())
    })
}

fn arb_backend_error() -> impl Strategy<Value = BackendError> {
    prop_oneof![
        (400u16..600, "[a-z ]{0,20}")
            .prop_map(|(status, detail)| BackendError::http(status, detail)),
        "[a-z ]{1,20}".prop_map(BackendError::transport),
    ]
}

fn arb_backend_result() -> impl Strategy<Value = Result<String, BackendError>> {
    prop_oneof![
        "[a-zA-Z0-9 .!?]{0,40}".prop_map(Ok::<String, BackendError>),
        arb_backend_error().prop_map(Err),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::ConsentGranted),
        Just(Event::ConsentDenied),
        arb_plain_message().prop_map(|text| Event::UserMessage { text }),
        arb_backend_result().prop_map(|result| Event::BackendReply { result }),
        Just(Event::Reset),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    // No submit ever succeeds unless consent was already granted
    #[test]
    fn prop_consent_gates_every_submit(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));

        for event in events {
            let consent_before = harness.state.consent();
            let is_submit = matches!(event, Event::UserMessage { .. });
            if let Ok(effects) = harness.dispatch(event) {
                if is_submit && effects.iter().any(|e| matches!(e, Effect::CallBackend { .. })) {
                    prop_assert_eq!(consent_before, ConsentState::Granted);
                }
            }
        }
    }

    // Every completed exchange grows the transcript by exactly two
    // turns, User then Assistant, success or failure alike
    #[test]
    fn prop_exchanges_append_in_pairs(
        exchanges in proptest::collection::vec((arb_plain_message(), arb_backend_result()), 1..10)
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));
        harness.dispatch(Event::ConsentGranted).unwrap();

        for (text, result) in exchanges {
            let len_before = harness.transcript.len();
            harness.exchange(&text, result).unwrap();

            prop_assert_eq!(harness.transcript.len(), len_before + 2);
            let turns = harness.transcript.turns();
            prop_assert_eq!(turns[len_before].role, Role::User);
            prop_assert_eq!(&turns[len_before].content, &text);
            prop_assert_eq!(turns[len_before + 1].role, Role::Assistant);
        }
    }

    // A keyword message ends the session, and nothing is accepted
    // afterwards without a reset
    #[test]
    fn prop_keyword_terminates(
        keyword in arb_keyword_message(),
        result in arb_backend_result(),
        followup in arb_plain_message(),
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));
        harness.dispatch(Event::ConsentGranted).unwrap();

        harness.exchange(&keyword, result).unwrap();
        prop_assert_eq!(harness.state.phase(), Phase::Ended);

        let err = harness
            .dispatch(Event::UserMessage { text: followup })
            .unwrap_err();
        prop_assert_eq!(err, TransitionError::SessionEnded);

        harness.dispatch(Event::Reset).unwrap();
        prop_assert_eq!(harness.state.phase(), Phase::Active);
    }

    // Non-keyword messages never terminate while the turn budget holds
    #[test]
    fn prop_plain_messages_keep_the_session_active(
        text in arb_plain_message(),
        result in arb_backend_result(),
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));
        harness.dispatch(Event::ConsentGranted).unwrap();

        harness.exchange(&text, result).unwrap();
        prop_assert_eq!(harness.state.phase(), Phase::Active);
    }

    // The turn budget ends the session after max_turns / 2 exchanges,
    // keyword or not
    #[test]
    fn prop_turn_budget_terminates(budget_exchanges in 1usize..6) {
        let max_turns = budget_exchanges * 2;
        let mut harness = Harness::new(test_context(max_turns, ConsentMode::Explicit));
        harness.dispatch(Event::ConsentGranted).unwrap();

        for i in 0..budget_exchanges {
            prop_assert_eq!(harness.state.phase(), Phase::Active);
            harness
                .exchange(&format!("message {i}"), Ok("reply".to_string()))
                .unwrap();
        }

        prop_assert_eq!(harness.state.phase(), Phase::Ended);
        prop_assert_eq!(harness.transcript.len(), max_turns);
    }

    // A backend failure still completes the exchange with the fixed
    // fallback text and leaves the session active
    #[test]
    fn prop_backend_failure_is_not_fatal(
        text in arb_plain_message(),
        error in arb_backend_error(),
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));
        harness.dispatch(Event::ConsentGranted).unwrap();

        harness.exchange(&text, Err(error)).unwrap();

        let turns = harness.transcript.turns();
        prop_assert_eq!(turns.len(), 2);
        prop_assert_eq!(&turns[1].content, FALLBACK_REPLY);
        prop_assert_eq!(harness.state.phase(), Phase::Active);
    }

    // The first consent decision wins; later decisions are no-ops
    #[test]
    fn prop_consent_is_decided_once(
        first in any::<bool>(),
        repeats in proptest::collection::vec(any::<bool>(), 1..5),
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));

        let decision = |grant: bool| if grant { Event::ConsentGranted } else { Event::ConsentDenied };

        harness.dispatch(decision(first)).unwrap();
        let settled = harness.state.consent();

        for repeat in repeats {
            harness.dispatch(decision(repeat)).unwrap();
            prop_assert_eq!(harness.state.consent(), settled);
        }
    }

    // Reset clears the transcript and re-enters Active while
    // identity and consent are untouched
    #[test]
    fn prop_reset_clears_and_reactivates(
        exchanges in proptest::collection::vec((arb_plain_message(), arb_backend_result()), 0..5)
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Explicit));
        harness.dispatch(Event::ConsentGranted).unwrap();

        for (text, result) in exchanges {
            harness.exchange(&text, result).unwrap();
        }

        harness.dispatch(Event::Reset).unwrap();

        prop_assert!(harness.transcript.is_empty());
        prop_assert_eq!(harness.state.phase(), Phase::Active);
        prop_assert_eq!(harness.state.consent(), ConsentState::Granted);
        prop_assert_eq!(&harness.ctx.session_id, "prop-session");
        prop_assert_eq!(&harness.ctx.interview_id, "PART_TIME");
    }

    // Banner mode implies consent: input is accepted from the start and
    // consent events are inert
    #[test]
    fn prop_banner_mode_accepts_input_immediately(
        text in arb_plain_message(),
        result in arb_backend_result(),
    ) {
        let mut harness = Harness::new(test_context(DEFAULT_MAX_TURNS, ConsentMode::Banner));
        prop_assert_eq!(harness.state.consent(), ConsentState::Granted);

        harness.dispatch(Event::ConsentDenied).unwrap();
        prop_assert_eq!(harness.state.consent(), ConsentState::Granted);

        harness.exchange(&text, result).unwrap();
        prop_assert_eq!(harness.transcript.len(), 2);
    }
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn scenario_greeting_then_quit() {
    let ctx = SessionContext::new(
        SessionIdentity {
            session_id: "abc".to_string(),
            interview_id: "PART_TIME".to_string(),
        },
        DEFAULT_MAX_TURNS,
        ConsentMode::Explicit,
    );
    let mut harness = Harness::new(ctx);
    harness.dispatch(Event::ConsentGranted).unwrap();

    harness.exchange("Hello", Ok("Hi there".to_string())).unwrap();
    assert_eq!(
        harness.transcript.turns(),
        &[Turn::user("Hello"), Turn::assistant("Hi there")]
    );
    assert_eq!(harness.state.phase(), Phase::Active);

    harness.exchange("quit", Ok("Bye".to_string())).unwrap();
    assert_eq!(harness.transcript.len(), 4);
    assert_eq!(harness.state.phase(), Phase::Ended);
}
