use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::identity::AuthorizedIdentity,
    state::state_machine::{
        AbandonReason, Outcome, SessionEvent, SessionPhase, SessionStateMachine,
    },
};

/// A participant's decision on whether to reveal profiles after the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RevealVote {
    /// Continue past the blind phase.
    Yes,
    /// Decline; the session resolves to a miss.
    No,
}

/// Progress reported by [`Session::acknowledge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckProgress {
    /// This participant had already acknowledged (retry no-op).
    AlreadyAcknowledged,
    /// Acknowledgement recorded; still waiting for the other side.
    Waiting,
    /// Both sides acknowledged and the call just started.
    Activated,
}

/// Live state for one paired session, owned by the coordinator for its
/// lifetime and mutated only under its lock.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier for this session.
    pub id: Uuid,
    participant_a: AuthorizedIdentity,
    participant_b: AuthorizedIdentity,
    /// Pairing timestamp.
    pub created_at: OffsetDateTime,
    /// Set when both participants acknowledged and the call began.
    pub activated_at: Option<OffsetDateTime>,
    /// Wall-clock moment the call ends, fixed at activation.
    pub call_deadline: Option<OffsetDateTime>,
    call_ended_at: Option<OffsetDateTime>,
    acknowledged: IndexMap<AuthorizedIdentity, OffsetDateTime>,
    votes: IndexMap<AuthorizedIdentity, RevealVote>,
    machine: SessionStateMachine,
}

impl Session {
    /// Create a fresh pending session for two distinct identities.
    pub fn new(
        participant_a: AuthorizedIdentity,
        participant_b: AuthorizedIdentity,
        created_at: OffsetDateTime,
    ) -> Self {
        debug_assert_ne!(participant_a, participant_b);
        Self {
            id: Uuid::new_v4(),
            participant_a,
            participant_b,
            created_at,
            activated_at: None,
            call_deadline: None,
            call_ended_at: None,
            acknowledged: IndexMap::new(),
            votes: IndexMap::new(),
            machine: SessionStateMachine::new(),
        }
    }

    /// Both identities taking part in this session.
    pub fn participants(&self) -> [&AuthorizedIdentity; 2] {
        [&self.participant_a, &self.participant_b]
    }

    /// Whether the given identity takes part in this session.
    pub fn is_participant(&self, who: &AuthorizedIdentity) -> bool {
        &self.participant_a == who || &self.participant_b == who
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Final outcome once the session reached a terminal phase.
    pub fn outcome(&self) -> Option<Outcome> {
        self.machine.outcome()
    }

    /// Record a participant's session-start acknowledgement.
    ///
    /// The second acknowledgement activates the call and fixes the wall-clock
    /// deadline. Retries from either side are no-ops.
    pub fn acknowledge(
        &mut self,
        who: &AuthorizedIdentity,
        now: OffsetDateTime,
        call_duration: Duration,
    ) -> Result<AckProgress, ServiceError> {
        self.ensure_participant(who)?;

        match self.machine.phase() {
            SessionPhase::Pending => {
                if self.acknowledged.contains_key(who) {
                    return Ok(AckProgress::AlreadyAcknowledged);
                }
                self.acknowledged.insert(who.clone(), now);

                if self.acknowledged.len() < 2 {
                    return Ok(AckProgress::Waiting);
                }

                self.machine
                    .apply(SessionEvent::CallStarted)
                    .map_err(ServiceError::from)?;
                self.activated_at = Some(now);
                self.call_deadline = Some(now + call_duration);
                Ok(AckProgress::Activated)
            }
            SessionPhase::Active | SessionPhase::AwaitingVotes => {
                Ok(AckProgress::AlreadyAcknowledged)
            }
            phase => Err(ServiceError::InvalidState(format!(
                "session `{}` already ended ({phase:?})",
                self.id
            ))),
        }
    }

    /// Move the call into the voting phase.
    ///
    /// Returns `true` when this call performed the transition and `false`
    /// when voting had already started or the session is terminal, so the
    /// deadline timer and duplicate `end` requests are harmless.
    pub fn begin_voting(&mut self, now: OffsetDateTime) -> Result<bool, ServiceError> {
        match self.machine.phase() {
            SessionPhase::Active => {
                self.machine
                    .apply(SessionEvent::CallEnded)
                    .map_err(ServiceError::from)?;
                self.call_ended_at = Some(now);
                Ok(true)
            }
            SessionPhase::AwaitingVotes
            | SessionPhase::Resolved(_)
            | SessionPhase::Abandoned => Ok(false),
            SessionPhase::Pending => Err(ServiceError::InvalidState(format!(
                "session `{}` call has not started",
                self.id
            ))),
        }
    }

    /// Record a reveal vote, resolving the session as soon as the outcome is
    /// determined.
    ///
    /// A `no` resolves to [`Outcome::Miss`] immediately without waiting for
    /// the other side; two `yes` votes resolve to [`Outcome::Match`].
    pub fn submit_vote(
        &mut self,
        who: &AuthorizedIdentity,
        vote: RevealVote,
    ) -> Result<Option<Outcome>, ServiceError> {
        self.ensure_participant(who)?;

        if !matches!(self.machine.phase(), SessionPhase::AwaitingVotes) {
            return Err(ServiceError::NotInVotingState(format!(
                "session `{}` is not collecting votes ({:?})",
                self.id,
                self.machine.phase()
            )));
        }

        if self.votes.contains_key(who) {
            return Err(ServiceError::AlreadyVoted(format!(
                "`{who}` already voted on session `{}`",
                self.id
            )));
        }
        self.votes.insert(who.clone(), vote);

        let outcome = if vote == RevealVote::No {
            Some(Outcome::Miss)
        } else if self.votes.len() == 2 {
            // Both voted and neither was a `no`.
            Some(Outcome::Match)
        } else {
            None
        };

        if let Some(outcome) = outcome {
            self.machine
                .apply(SessionEvent::Resolved(outcome))
                .map_err(ServiceError::from)?;
        }

        Ok(outcome)
    }

    /// Resolve the session once the voting timeout expires, treating absent
    /// votes as implicit `no`.
    ///
    /// Returns `None` when the session was already resolved, so redundant
    /// timer firings have no effect.
    pub fn resolve_absent_votes(&mut self) -> Option<Outcome> {
        if !matches!(self.machine.phase(), SessionPhase::AwaitingVotes) {
            return None;
        }

        // A fully yes-voted session resolves inline, so reaching the timeout
        // means at least one vote is missing.
        self.machine
            .apply(SessionEvent::Resolved(Outcome::Miss))
            .ok()
            .map(|_| Outcome::Miss)
    }

    /// Abandon the session before resolution. Returns `false` when the
    /// session is already terminal.
    pub fn abandon(&mut self, reason: AbandonReason) -> bool {
        self.machine.apply(SessionEvent::Abandon(reason)).is_ok()
    }

    /// Seconds left on the call, computed from the server wall clock.
    ///
    /// `None` outside the active phase.
    pub fn time_remaining_secs(&self, now: OffsetDateTime) -> Option<u64> {
        if !matches!(self.machine.phase(), SessionPhase::Active) {
            return None;
        }
        let deadline = self.call_deadline?;
        Some((deadline - now).whole_seconds().max(0) as u64)
    }

    /// How long the call lasted, for the terminal record.
    pub fn elapsed_call_secs(&self, now: OffsetDateTime) -> u64 {
        let Some(start) = self.activated_at else {
            return 0;
        };
        let end = self.call_ended_at.unwrap_or(now);
        (end - start).whole_seconds().max(0) as u64
    }

    fn ensure_participant(&self, who: &AuthorizedIdentity) -> Result<(), ServiceError> {
        if self.is_participant(who) {
            Ok(())
        } else {
            Err(ServiceError::UnknownParticipant(format!(
                "`{who}` is not part of session `{}`",
                self.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::{IdentityVerifier, OpaqueTokenVerifier};

    const CALL: Duration = Duration::from_secs(300);

    fn identity(name: &str) -> AuthorizedIdentity {
        OpaqueTokenVerifier.verify(name).unwrap()
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn active_session() -> (Session, AuthorizedIdentity, AuthorizedIdentity) {
        let (alice, bob) = (identity("alice"), identity("bob"));
        let mut session = Session::new(alice.clone(), bob.clone(), now());
        session.acknowledge(&alice, now(), CALL).unwrap();
        session.acknowledge(&bob, now(), CALL).unwrap();
        (session, alice, bob)
    }

    #[test]
    fn second_ack_activates_and_fixes_the_deadline() {
        let (alice, bob) = (identity("alice"), identity("bob"));
        let mut session = Session::new(alice.clone(), bob.clone(), now());

        assert_eq!(
            session.acknowledge(&alice, now(), CALL).unwrap(),
            AckProgress::Waiting
        );
        assert_eq!(
            session.acknowledge(&alice, now(), CALL).unwrap(),
            AckProgress::AlreadyAcknowledged
        );
        assert_eq!(
            session.acknowledge(&bob, now(), CALL).unwrap(),
            AckProgress::Activated
        );
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.call_deadline, Some(now() + CALL));
        assert_eq!(session.time_remaining_secs(now()), Some(300));
        assert_eq!(
            session.time_remaining_secs(now() + Duration::from_secs(500)),
            Some(0)
        );
    }

    #[test]
    fn strangers_are_rejected() {
        let (mut session, _, _) = active_session();
        let mallory = identity("mallory");

        let err = session
            .acknowledge(&mallory, now(), CALL)
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownParticipant(_)));

        session.begin_voting(now()).unwrap();
        let err = session.submit_vote(&mallory, RevealVote::Yes).unwrap_err();
        assert!(matches!(err, ServiceError::UnknownParticipant(_)));
    }

    #[test]
    fn mutual_yes_resolves_match() {
        let (mut session, alice, bob) = active_session();
        assert!(session.begin_voting(now()).unwrap());

        assert_eq!(session.submit_vote(&alice, RevealVote::Yes).unwrap(), None);
        assert_eq!(
            session.submit_vote(&bob, RevealVote::Yes).unwrap(),
            Some(Outcome::Match)
        );
        assert_eq!(session.outcome(), Some(Outcome::Match));
    }

    #[test]
    fn a_single_no_short_circuits_to_miss() {
        // Either arrival order yields the same outcome, and the `no` resolves
        // without waiting for the second vote.
        let (mut session, alice, _) = active_session();
        session.begin_voting(now()).unwrap();
        assert_eq!(
            session.submit_vote(&alice, RevealVote::No).unwrap(),
            Some(Outcome::Miss)
        );

        let (mut session, alice, bob) = active_session();
        session.begin_voting(now()).unwrap();
        assert_eq!(session.submit_vote(&bob, RevealVote::Yes).unwrap(), None);
        assert_eq!(
            session.submit_vote(&alice, RevealVote::No).unwrap(),
            Some(Outcome::Miss)
        );
    }

    #[test]
    fn duplicate_votes_are_rejected() {
        let (mut session, alice, _) = active_session();
        session.begin_voting(now()).unwrap();
        session.submit_vote(&alice, RevealVote::Yes).unwrap();

        let err = session.submit_vote(&alice, RevealVote::Yes).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyVoted(_)));
    }

    #[test]
    fn voting_outside_the_voting_phase_fails() {
        let (mut session, alice, _) = active_session();
        let err = session.submit_vote(&alice, RevealVote::Yes).unwrap_err();
        assert!(matches!(err, ServiceError::NotInVotingState(_)));
    }

    #[test]
    fn begin_voting_is_idempotent() {
        let (mut session, _, _) = active_session();
        assert!(session.begin_voting(now()).unwrap());
        assert!(!session.begin_voting(now()).unwrap());
        assert_eq!(session.phase(), SessionPhase::AwaitingVotes);
    }

    #[test]
    fn voting_timeout_defaults_to_miss_exactly_once() {
        let (mut session, alice, _) = active_session();
        session.begin_voting(now()).unwrap();
        session.submit_vote(&alice, RevealVote::Yes).unwrap();

        assert_eq!(session.resolve_absent_votes(), Some(Outcome::Miss));
        assert_eq!(session.resolve_absent_votes(), None);
        assert_eq!(session.outcome(), Some(Outcome::Miss));
    }

    #[test]
    fn abandon_before_resolution() {
        let (mut session, _, _) = active_session();
        assert!(session.abandon(AbandonReason::Disconnect));
        assert!(!session.abandon(AbandonReason::Disconnect));
        assert_eq!(session.outcome(), Some(Outcome::Abandoned));
    }

    #[test]
    fn elapsed_call_duration_tracks_early_end() {
        let (mut session, _, _) = active_session();
        let end = now() + Duration::from_secs(134);
        session.begin_voting(end).unwrap();
        assert_eq!(session.elapsed_call_secs(end + Duration::from_secs(60)), 134);

        let (alice, bob) = (identity("alice"), identity("bob"));
        let never_started = Session::new(alice, bob, now());
        assert_eq!(never_started.elapsed_call_secs(now()), 0);
    }
}
