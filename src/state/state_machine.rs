use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Terminal classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Both participants voted to reveal.
    Match,
    /// At least one participant declined (explicitly or by voting timeout).
    Miss,
    /// A participant dropped or never acknowledged before resolution.
    Abandoned,
}

/// Lifecycle phases a paired session moves through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created at pairing; waiting for both participants to acknowledge.
    Pending,
    /// Call in progress, bounded by the wall-clock deadline.
    Active,
    /// Call is over; collecting reveal votes from both sides.
    AwaitingVotes,
    /// Votes resolved into a final outcome (`Match` or `Miss`).
    Resolved(Outcome),
    /// Session ended before resolution (missed ack or disconnect).
    Abandoned,
}

impl SessionPhase {
    /// Whether the session can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Resolved(_) | SessionPhase::Abandoned)
    }
}

/// Reason a session was abandoned before reaching resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// A participant never acknowledged within the grace period.
    AckTimeout,
    /// A participant's event stream dropped mid-session.
    Disconnect,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Both participants acknowledged the pairing; the call starts.
    CallStarted,
    /// The call deadline was reached or a participant ended the call early.
    CallEnded,
    /// Votes (or their absence) determined the outcome.
    Resolved(Outcome),
    /// The session was abandoned before resolution.
    Abandon(AbandonReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// State machine implementing the session lifecycle.
///
/// Callers serialize access through the owning session's lock, so a plain
/// apply is atomic; idempotence against redundant timers and retried client
/// requests is enforced by phase guards at the call sites.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Pending,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the pending state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase.clone()
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Final outcome, once the machine has reached a terminal phase.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            SessionPhase::Resolved(outcome) => Some(outcome),
            SessionPhase::Abandoned => Some(Outcome::Abandoned),
            _ => None,
        }
    }

    /// Apply an event, moving the state machine to the next phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next.clone();
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase.clone(), event) {
            (SessionPhase::Pending, SessionEvent::CallStarted) => SessionPhase::Active,
            (SessionPhase::Active, SessionEvent::CallEnded) => SessionPhase::AwaitingVotes,
            // An abandoned session never carries a vote-derived outcome.
            (SessionPhase::AwaitingVotes, SessionEvent::Resolved(outcome))
                if outcome != Outcome::Abandoned =>
            {
                SessionPhase::Resolved(outcome)
            }
            (
                SessionPhase::Pending | SessionPhase::Active | SessionPhase::AwaitingVotes,
                SessionEvent::Abandon(_),
            ) => SessionPhase::Abandoned,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_pending() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Pending);
        assert_eq!(sm.outcome(), None);
    }

    #[test]
    fn full_happy_path_to_match() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(
            apply(&mut sm, SessionEvent::CallStarted),
            SessionPhase::Active
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::CallEnded),
            SessionPhase::AwaitingVotes
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Resolved(Outcome::Match)),
            SessionPhase::Resolved(Outcome::Match)
        );
        assert!(sm.phase().is_terminal());
        assert_eq!(sm.outcome(), Some(Outcome::Match));
        assert_eq!(sm.version(), 3);
    }

    #[test]
    fn rejection_resolves_to_miss() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::CallStarted);
        apply(&mut sm, SessionEvent::CallEnded);
        assert_eq!(
            apply(&mut sm, SessionEvent::Resolved(Outcome::Miss)),
            SessionPhase::Resolved(Outcome::Miss)
        );
    }

    #[test]
    fn abandon_reachable_from_every_live_phase() {
        for advance in 0..3usize {
            let mut sm = SessionStateMachine::new();
            if advance >= 1 {
                apply(&mut sm, SessionEvent::CallStarted);
            }
            if advance >= 2 {
                apply(&mut sm, SessionEvent::CallEnded);
            }
            assert_eq!(
                apply(&mut sm, SessionEvent::Abandon(AbandonReason::Disconnect)),
                SessionPhase::Abandoned
            );
            assert_eq!(sm.outcome(), Some(Outcome::Abandoned));
        }
    }

    #[test]
    fn terminal_phase_rejects_further_events() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Abandon(AbandonReason::AckTimeout));

        let err = sm.apply(SessionEvent::CallStarted).unwrap_err();
        assert_eq!(err.from, SessionPhase::Abandoned);
        assert_eq!(err.event, SessionEvent::CallStarted);
        assert_eq!(sm.version(), 1);
    }

    #[test]
    fn abandoned_outcome_cannot_be_voted_in() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::CallStarted);
        apply(&mut sm, SessionEvent::CallEnded);

        let err = sm
            .apply(SessionEvent::Resolved(Outcome::Abandoned))
            .unwrap_err();
        assert_eq!(err.from, SessionPhase::AwaitingVotes);
    }

    #[test]
    fn voting_cannot_start_before_the_call() {
        let mut sm = SessionStateMachine::new();
        let err = sm.apply(SessionEvent::CallEnded).unwrap_err();
        assert_eq!(err.from, SessionPhase::Pending);
    }
}
