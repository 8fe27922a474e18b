//! The negotiation state machine.
//!
//! ```text
//!   Idle
//!    │ initiate / receive_request
//!    ▼
//!   Negotiating ──reject/timeout──► Rejected (terminal)
//!    │ accept
//!    ▼
//!   CodeGeneration ──code_error──► Failed (terminal)
//!    │ code_ready
//!    ▼
//!   TestCases ──skip_tests──► Ready
//!    │ tests_agreed
//!    ▼
//!   Testing ──tests_failed──► FixError
//!    │ tests_passed          │ fix_rejected ► Failed
//!    ▼                       │ fix_accepted ► CodeGeneration
//!   Ready
//!    │ start_communication
//!    ▼
//!   Communicating ──protocol_error──► FixError
//!    │ end
//!    ▼
//!   Done (terminal)
//! ```
//!
//! All transitions are guarded. An out-of-state inbound message is dropped
//! at the codec boundary ([`NegotiationSession::handle_message`]) and only
//! counted; it never desynchronizes the peers. `end` is honored in every
//! non-terminal state.

use std::time::Duration;

use anp_types::did::Did;

use crate::codec::{MetaMessage, NegotiationStatus};
use crate::error::MetaError;

/// States of a negotiation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Negotiating,
    CodeGeneration,
    TestCases,
    Testing,
    FixError,
    Ready,
    Communicating,
    Rejected,
    Failed,
    Done,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Rejected | SessionState::Failed | SessionState::Done)
    }
}

/// Events the machine reacts to. Inbound messages, local decisions, and
/// timer expiry all arrive through this one type, which is what makes the
/// machine deterministic under a recorded event sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Initiate,
    ReceiveRequest,
    /// A counter-proposal while negotiating; increments the round counter.
    Negotiate,
    Accept,
    Reject,
    CodeReady,
    CodeError,
    TestsAgreed,
    SkipTests,
    TestsPassed,
    TestsFailed,
    FixAccepted,
    FixRejected,
    StartCommunication,
    ProtocolError,
    Timeout,
    End,
}

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hard bound on negotiation rounds; exceeding it rejects the session.
    pub max_negotiation_rounds: u32,
    /// How long each state may wait before the host loop reports `Timeout`.
    pub state_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_negotiation_rounds: 10,
            state_timeout: Duration::from_secs(30),
        }
    }
}

/// One meta-protocol session between two DIDs.
#[derive(Debug)]
pub struct NegotiationSession {
    local: Did,
    remote: Did,
    config: SessionConfig,
    state: SessionState,
    sequence_id: u64,
    round: u32,
    candidate_protocols: Option<String>,
    agreed_protocol: Option<String>,
    test_cases: Option<String>,
    errors: Vec<String>,
    dropped_messages: u64,
}

impl NegotiationSession {
    pub fn new(local: Did, remote: Did, config: SessionConfig) -> Self {
        Self {
            local,
            remote,
            config,
            state: SessionState::Idle,
            sequence_id: 0,
            round: 0,
            candidate_protocols: None,
            agreed_protocol: None,
            test_cases: None,
            errors: Vec::new(),
            dropped_messages: 0,
        }
    }

    pub fn local(&self) -> &Did {
        &self.local
    }

    pub fn remote(&self) -> &Did {
        &self.remote
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn candidate_protocols(&self) -> Option<&str> {
        self.candidate_protocols.as_deref()
    }

    pub fn agreed_protocol(&self) -> Option<&str> {
        self.agreed_protocol.as_deref()
    }

    pub fn test_cases(&self) -> Option<&str> {
        self.test_cases.as_deref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Diagnostic only: messages swallowed at the codec boundary.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    /// The timeout the host loop should arm for the current state.
    pub fn state_timeout(&self) -> Duration {
        self.config.state_timeout
    }

    /// Allocates the sequence id for the next outbound message. Monotonic
    /// per session.
    pub fn next_sequence_id(&mut self) -> u64 {
        self.sequence_id += 1;
        self.sequence_id
    }

    /// Applies an event, returning the new state.
    ///
    /// Illegal `(state, event)` pairs fail with
    /// [`MetaError::InvalidTransition`] and leave the state untouched.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<SessionState, MetaError> {
        use SessionEvent as E;
        use SessionState as S;

        // External cancellation wins in any non-terminal state.
        if event == E::End && !self.state.is_terminal() {
            self.state = S::Done;
            return Ok(self.state);
        }

        let next = match (self.state, event) {
            (S::Idle, E::Initiate) | (S::Idle, E::ReceiveRequest) => S::Negotiating,
            (S::Negotiating, E::Negotiate) => {
                self.round += 1;
                if self.round > self.config.max_negotiation_rounds {
                    self.state = S::Rejected;
                    return Err(MetaError::MaxRoundsExceeded(
                        self.config.max_negotiation_rounds,
                    ));
                }
                S::Negotiating
            }
            (S::Negotiating, E::Accept) => S::CodeGeneration,
            (S::Negotiating, E::Reject) | (S::Negotiating, E::Timeout) => S::Rejected,
            (S::CodeGeneration, E::CodeReady) => S::TestCases,
            (S::CodeGeneration, E::CodeError) | (S::CodeGeneration, E::Timeout) => S::Failed,
            (S::TestCases, E::TestsAgreed) => S::Testing,
            (S::TestCases, E::SkipTests) => S::Ready,
            (S::TestCases, E::Timeout) => S::Failed,
            (S::Testing, E::TestsPassed) => S::Ready,
            (S::Testing, E::TestsFailed) => S::FixError,
            (S::Testing, E::Timeout) => S::Failed,
            (S::FixError, E::FixAccepted) => S::CodeGeneration,
            (S::FixError, E::FixRejected) | (S::FixError, E::Timeout) => S::Failed,
            (S::Ready, E::StartCommunication) => S::Communicating,
            (S::Ready, E::Timeout) => S::Failed,
            (S::Communicating, E::ProtocolError) => S::FixError,
            (S::Communicating, E::Timeout) => S::Failed,
            (state, event) => {
                return Err(MetaError::InvalidTransition { state, event });
            }
        };
        self.state = next;
        Ok(next)
    }

    /// The codec boundary: maps an inbound message to an event and applies
    /// it. Out-of-state messages are dropped silently (counted for the
    /// diagnostic API) so a confused peer cannot desynchronize the machine.
    pub fn handle_message(&mut self, message: &MetaMessage) -> Option<SessionState> {
        self.record(message);
        let event = self.event_for(message)?;
        match self.handle_event(event) {
            Ok(state) => Some(state),
            Err(MetaError::MaxRoundsExceeded(_)) => Some(self.state),
            Err(_) => {
                self.dropped_messages += 1;
                tracing::debug!(state = ?self.state, ?message, "dropping out-of-state message");
                None
            }
        }
    }

    fn record(&mut self, message: &MetaMessage) {
        match message {
            MetaMessage::ProtocolNegotiation {
                candidate_protocols,
                status,
                ..
            } => {
                self.candidate_protocols = Some(candidate_protocols.clone());
                if *status == NegotiationStatus::Accepted {
                    self.agreed_protocol = Some(candidate_protocols.clone());
                }
            }
            MetaMessage::TestCasesNegotiation { test_cases, .. } => {
                self.test_cases = Some(test_cases.clone());
            }
            MetaMessage::FixErrorNegotiation {
                error_description, ..
            } => {
                self.errors.push(error_description.clone());
            }
            MetaMessage::CodeGeneration { .. } | MetaMessage::NaturalLanguageNegotiation { .. } => {}
        }
    }

    fn event_for(&self, message: &MetaMessage) -> Option<SessionEvent> {
        use crate::codec::CodeStatus;
        match message {
            MetaMessage::ProtocolNegotiation { status, .. } => Some(match status {
                NegotiationStatus::Negotiating => {
                    if self.state == SessionState::Idle {
                        SessionEvent::ReceiveRequest
                    } else {
                        SessionEvent::Negotiate
                    }
                }
                NegotiationStatus::Accepted => SessionEvent::Accept,
                NegotiationStatus::Rejected => SessionEvent::Reject,
            }),
            // A synonym for negotiate; see the protocol design notes.
            MetaMessage::NaturalLanguageNegotiation { .. } => {
                Some(if self.state == SessionState::Idle {
                    SessionEvent::ReceiveRequest
                } else {
                    SessionEvent::Negotiate
                })
            }
            MetaMessage::CodeGeneration { status, .. } => Some(match status {
                CodeStatus::Generated => SessionEvent::CodeReady,
                CodeStatus::Error => SessionEvent::CodeError,
            }),
            MetaMessage::TestCasesNegotiation { status, .. } => match status {
                NegotiationStatus::Accepted => Some(SessionEvent::TestsAgreed),
                NegotiationStatus::Rejected => Some(SessionEvent::SkipTests),
                // A proposal under discussion is not yet a transition.
                NegotiationStatus::Negotiating => None,
            },
            MetaMessage::FixErrorNegotiation { status, .. } => match status {
                NegotiationStatus::Accepted => Some(SessionEvent::FixAccepted),
                NegotiationStatus::Rejected => Some(SessionEvent::FixRejected),
                NegotiationStatus::Negotiating => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodeStatus;

    fn session() -> NegotiationSession {
        NegotiationSession::new(
            Did::new("did:wba:didhost.cc:a").unwrap(),
            Did::new("did:wba:didhost.cc:b").unwrap(),
            SessionConfig::default(),
        )
    }

    fn drive(session: &mut NegotiationSession, events: &[SessionEvent]) {
        for event in events {
            session.handle_event(*event).unwrap();
        }
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut s = session();
        drive(
            &mut s,
            &[
                SessionEvent::Initiate,
                SessionEvent::Accept,
                SessionEvent::CodeReady,
                SessionEvent::TestsAgreed,
                SessionEvent::TestsPassed,
                SessionEvent::StartCommunication,
                SessionEvent::End,
            ],
        );
        assert_eq!(s.state(), SessionState::Done);
        assert!(s.state().is_terminal());
    }

    #[test]
    fn skip_tests_short_circuits_to_ready() {
        let mut s = session();
        drive(
            &mut s,
            &[SessionEvent::ReceiveRequest, SessionEvent::Accept, SessionEvent::CodeReady, SessionEvent::SkipTests],
        );
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn fix_loop_returns_to_code_generation() {
        let mut s = session();
        drive(
            &mut s,
            &[
                SessionEvent::Initiate,
                SessionEvent::Accept,
                SessionEvent::CodeReady,
                SessionEvent::TestsAgreed,
                SessionEvent::TestsFailed,
                SessionEvent::FixAccepted,
            ],
        );
        assert_eq!(s.state(), SessionState::CodeGeneration);
    }

    #[test]
    fn protocol_error_during_communication_enters_fix() {
        let mut s = session();
        drive(
            &mut s,
            &[
                SessionEvent::Initiate,
                SessionEvent::Accept,
                SessionEvent::CodeReady,
                SessionEvent::SkipTests,
                SessionEvent::StartCommunication,
                SessionEvent::ProtocolError,
            ],
        );
        assert_eq!(s.state(), SessionState::FixError);
    }

    #[test]
    fn end_is_valid_in_every_non_terminal_state() {
        for prefix in [
            vec![],
            vec![SessionEvent::Initiate],
            vec![SessionEvent::Initiate, SessionEvent::Accept],
            vec![SessionEvent::Initiate, SessionEvent::Accept, SessionEvent::CodeReady],
        ] {
            let mut s = session();
            drive(&mut s, &prefix);
            assert_eq!(s.handle_event(SessionEvent::End).unwrap(), SessionState::Done);
        }
    }

    #[test]
    fn end_does_not_resurrect_terminal_sessions() {
        let mut s = session();
        drive(&mut s, &[SessionEvent::Initiate, SessionEvent::Reject]);
        assert_eq!(s.state(), SessionState::Rejected);
        assert!(s.handle_event(SessionEvent::End).is_err());
        assert_eq!(s.state(), SessionState::Rejected);
    }

    #[test]
    fn timeout_routes_per_state() {
        let mut negotiating = session();
        drive(&mut negotiating, &[SessionEvent::Initiate]);
        assert_eq!(
            negotiating.handle_event(SessionEvent::Timeout).unwrap(),
            SessionState::Rejected
        );

        let mut generating = session();
        drive(&mut generating, &[SessionEvent::Initiate, SessionEvent::Accept]);
        assert_eq!(
            generating.handle_event(SessionEvent::Timeout).unwrap(),
            SessionState::Failed
        );
    }

    #[test]
    fn round_bound_autonomously_rejects() {
        let mut s = session();
        s.handle_event(SessionEvent::Initiate).unwrap();
        for _ in 0..10 {
            s.handle_event(SessionEvent::Negotiate).unwrap();
        }
        assert_eq!(s.round(), 10);
        // Round 11 crosses the bound.
        assert_eq!(
            s.handle_event(SessionEvent::Negotiate),
            Err(MetaError::MaxRoundsExceeded(10))
        );
        assert_eq!(s.state(), SessionState::Rejected);
    }

    #[test]
    fn sequence_ids_are_monotonic() {
        let mut s = session();
        let first = s.next_sequence_id();
        let second = s.next_sequence_id();
        assert!(second > first);
    }

    #[test]
    fn machine_is_deterministic_under_identical_event_sequences() {
        let events = [
            SessionEvent::Initiate,
            SessionEvent::Negotiate,
            SessionEvent::Accept,
            SessionEvent::CodeReady,
            SessionEvent::TestsAgreed,
            SessionEvent::TestsFailed,
            SessionEvent::FixAccepted,
            SessionEvent::CodeReady,
            SessionEvent::TestsAgreed,
            SessionEvent::TestsPassed,
        ];
        let mut a = session();
        let mut b = session();
        for event in events {
            let ra = a.handle_event(event);
            let rb = b.handle_event(event);
            assert_eq!(ra, rb);
        }
        assert_eq!(a.state(), b.state());
        assert_eq!(a.round(), b.round());
    }

    #[test]
    fn out_of_state_messages_are_dropped_and_counted() {
        let mut s = session();
        // Tests cannot be agreed while still Idle.
        let message = MetaMessage::TestCasesNegotiation {
            sequence_id: 1,
            test_cases: "echo".into(),
            status: NegotiationStatus::Accepted,
        };
        assert_eq!(s.handle_message(&message), None);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.dropped_messages(), 1);
    }

    #[test]
    fn message_flow_drives_the_machine() {
        let mut s = session();
        let negotiate = MetaMessage::ProtocolNegotiation {
            sequence_id: 1,
            round: 1,
            candidate_protocols: "openrpc".into(),
            status: NegotiationStatus::Negotiating,
            modification_summary: None,
        };
        assert_eq!(s.handle_message(&negotiate), Some(SessionState::Negotiating));

        let accept = MetaMessage::ProtocolNegotiation {
            sequence_id: 2,
            round: 1,
            candidate_protocols: "openrpc".into(),
            status: NegotiationStatus::Accepted,
            modification_summary: None,
        };
        assert_eq!(s.handle_message(&accept), Some(SessionState::CodeGeneration));
        assert_eq!(s.agreed_protocol(), Some("openrpc"));

        let generated = MetaMessage::CodeGeneration {
            sequence_id: 3,
            status: CodeStatus::Generated,
        };
        assert_eq!(s.handle_message(&generated), Some(SessionState::TestCases));

        // A test-case proposal under discussion does not transition.
        let proposal = MetaMessage::TestCasesNegotiation {
            sequence_id: 4,
            test_cases: "echo".into(),
            status: NegotiationStatus::Negotiating,
        };
        assert_eq!(s.handle_message(&proposal), None);
        assert_eq!(s.state(), SessionState::TestCases);
        assert_eq!(s.test_cases(), Some("echo"));
        assert_eq!(s.dropped_messages(), 0);
    }

    #[test]
    fn natural_language_negotiation_is_a_negotiate_synonym() {
        let mut s = session();
        let message = MetaMessage::NaturalLanguageNegotiation {
            sequence_id: 1,
            message: "shall we speak JSON-RPC?".into(),
        };
        assert_eq!(s.handle_message(&message), Some(SessionState::Negotiating));
        assert_eq!(s.round(), 0);
        // Subsequent ones count as negotiation rounds.
        assert_eq!(s.handle_message(&message), Some(SessionState::Negotiating));
        assert_eq!(s.round(), 1);
    }
}
