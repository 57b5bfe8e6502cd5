//! Session coordinator: drives each paired session through its lifecycle,
//! owns the deadline timers, and records the terminal outcome.

use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::SessionRecord,
    dto::session::SessionSummary,
    error::ServiceError,
    services::{identity::AuthorizedIdentity, sse_events},
    state::{
        SharedState,
        session::{AckProgress, RevealVote, Session},
        state_machine::{AbandonReason, Outcome, SessionPhase},
    },
};

/// Snapshot a session for `GET /sessions/{id}`; participants only.
pub async fn session_summary(
    state: &SharedState,
    identity: &AuthorizedIdentity,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let handle = require_session(state, session_id)?;
    let session = handle.lock().await;

    if !session.is_participant(identity) {
        return Err(ServiceError::UnknownParticipant(format!(
            "`{identity}` is not part of session `{session_id}`"
        )));
    }

    Ok(SessionSummary::from_session(
        &session,
        OffsetDateTime::now_utc(),
    ))
}

/// Record a participant's session-start acknowledgement.
///
/// The second acknowledgement activates the call: the wall-clock deadline is
/// fixed and the deadline timer spawned, independent of any further client
/// requests.
pub async fn acknowledge(
    state: &SharedState,
    identity: &AuthorizedIdentity,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    let handle = require_session(state, session_id)?;
    let mut session = handle.lock().await;

    let now = OffsetDateTime::now_utc();
    let progress = session.acknowledge(identity, now, state.config().call_duration)?;

    if progress == AckProgress::Activated {
        let remaining = session
            .time_remaining_secs(now)
            .unwrap_or(state.config().call_duration.as_secs());
        info!(%session_id, "both participants acknowledged; call started");
        sse_events::broadcast_call_active(state, &session.participants(), session_id, remaining);
        spawn_call_deadline(state, session_id);
    }

    Ok(())
}

/// End the call early on a participant's request. Duplicate calls no-op.
pub async fn end_early(
    state: &SharedState,
    identity: &AuthorizedIdentity,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    let handle = require_session(state, session_id)?;
    let mut session = handle.lock().await;

    if !session.is_participant(identity) {
        return Err(ServiceError::UnknownParticipant(format!(
            "`{identity}` is not part of session `{session_id}`"
        )));
    }

    if session.begin_voting(OffsetDateTime::now_utc())? {
        info!(%session_id, %identity, "call ended early; voting opened");
        open_voting(state, &session);
    }

    Ok(())
}

/// Submit a reveal vote, resolving the session as soon as the outcome is
/// determined.
pub async fn submit_vote(
    state: &SharedState,
    identity: &AuthorizedIdentity,
    session_id: Uuid,
    vote: RevealVote,
) -> Result<(), ServiceError> {
    let handle = require_session(state, session_id)?;
    let mut session = handle.lock().await;

    if let Some(outcome) = session.submit_vote(identity, vote)? {
        finalize(state, &mut session, outcome).await;
    }

    Ok(())
}

/// Abandon the live session of a participant whose event stream dropped.
///
/// No-op when the identity has no live session or the session is already
/// terminal, so late disconnects after resolution are harmless.
pub async fn abandon_on_disconnect(state: &SharedState, identity: &AuthorizedIdentity) {
    let Some(session_id) = state.active_session_id(identity) else {
        return;
    };
    let Some(handle) = state.session(session_id) else {
        return;
    };

    let mut session = handle.lock().await;
    if session.abandon(AbandonReason::Disconnect) {
        warn!(%session_id, %identity, "participant disconnected mid-session");
        finalize(state, &mut session, Outcome::Abandoned).await;
    }
}

/// Arm the acknowledgement grace timer for a fresh pairing.
///
/// If the session is still pending when the grace period elapses, it is
/// abandoned; a session whose call already started is left untouched.
pub fn spawn_ack_grace(state: &SharedState, session_id: Uuid) {
    let state = state.clone();
    tokio::spawn(async move {
        sleep(state.config().ack_grace).await;

        let Some(handle) = state.session(session_id) else {
            return;
        };
        let mut session = handle.lock().await;
        if matches!(session.phase(), SessionPhase::Pending)
            && session.abandon(AbandonReason::AckTimeout)
        {
            warn!(%session_id, "pairing never acknowledged by both sides");
            finalize(&state, &mut session, Outcome::Abandoned).await;
        }
    });
}

/// Arm the call deadline timer; fires even if both clients go silent.
fn spawn_call_deadline(state: &SharedState, session_id: Uuid) {
    let state = state.clone();
    tokio::spawn(async move {
        sleep(state.config().call_duration).await;

        let Some(handle) = state.session(session_id) else {
            return;
        };
        let mut session = handle.lock().await;
        // An early end or an abandon may have beaten the timer; both leave
        // nothing to do here.
        if let Ok(true) = session.begin_voting(OffsetDateTime::now_utc()) {
            info!(%session_id, "call deadline reached; voting opened");
            open_voting(&state, &session);
        }
    });
}

/// Arm the voting timeout; absent votes become an implicit no.
fn spawn_voting_timeout(state: &SharedState, session_id: Uuid) {
    let state = state.clone();
    tokio::spawn(async move {
        sleep(state.config().voting_timeout).await;

        let Some(handle) = state.session(session_id) else {
            return;
        };
        let mut session = handle.lock().await;
        if let Some(outcome) = session.resolve_absent_votes() {
            info!(%session_id, "voting timed out; defaulting missing votes to no");
            finalize(&state, &mut session, outcome).await;
        }
    });
}

fn open_voting(state: &SharedState, session: &Session) {
    sse_events::broadcast_voting(state, &session.participants(), session.id);
    spawn_voting_timeout(state, session.id);
}

/// Persist the terminal record, notify both participants, and tear the live
/// session down.
///
/// Callers invoke this at most once per session: it only runs right after a
/// successful terminal transition performed under the session lock.
async fn finalize(state: &SharedState, session: &mut Session, outcome: Outcome) {
    let now = OffsetDateTime::now_utc();
    let record = SessionRecord {
        session_id: session.id,
        participants: session.participants().map(|p| p.as_str().to_string()),
        outcome,
        duration_secs: session.elapsed_call_secs(now),
        created_at: session.created_at,
        ended_at: now,
    };

    if let Err(err) = state.store().record(record).await {
        warn!(session_id = %session.id, error = %err, "failed to persist session record");
    }

    let participants = session.participants();
    match outcome {
        Outcome::Abandoned => sse_events::broadcast_abandoned(state, &participants, session.id),
        _ => sse_events::broadcast_resolved(state, &participants, session.id, outcome),
    }

    info!(session_id = %session.id, ?outcome, "session finalized");
    state.remove_session(session.id);
}

fn require_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<std::sync::Arc<tokio::sync::Mutex<Session>>, ServiceError> {
    state
        .session(session_id)
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::MemorySessionStore,
        services::identity::{IdentityVerifier, OpaqueTokenVerifier},
        state::{AppState, state_machine::Outcome},
    };

    fn identity(name: &str) -> AuthorizedIdentity {
        OpaqueTokenVerifier.verify(name).unwrap()
    }

    fn test_state(config: AppConfig) -> SharedState {
        AppState::new(
            config,
            Arc::new(OpaqueTokenVerifier),
            Arc::new(MemorySessionStore::new()),
        )
    }

    fn short_timers() -> AppConfig {
        AppConfig {
            call_duration: Duration::from_secs(300),
            ack_grace: Duration::from_millis(40),
            voting_timeout: Duration::from_millis(40),
            ..AppConfig::default()
        }
    }

    async fn paired_session(state: &SharedState) -> (Uuid, AuthorizedIdentity, AuthorizedIdentity) {
        let (alice, bob) = (identity("alice"), identity("bob"));
        let session = Session::new(alice.clone(), bob.clone(), OffsetDateTime::now_utc());
        let (id, _) = state.register_session(session);
        (id, alice, bob)
    }

    async fn activated_session(
        state: &SharedState,
    ) -> (Uuid, AuthorizedIdentity, AuthorizedIdentity) {
        let (id, alice, bob) = paired_session(state).await;
        acknowledge(state, &alice, id).await.unwrap();
        acknowledge(state, &bob, id).await.unwrap();
        (id, alice, bob)
    }

    #[tokio::test]
    async fn mutual_yes_resolves_match_and_records_both_histories() {
        let state = test_state(AppConfig::default());
        let (id, alice, bob) = activated_session(&state).await;

        end_early(&state, &alice, id).await.unwrap();
        // Retried end from the other side is a no-op.
        end_early(&state, &bob, id).await.unwrap();

        submit_vote(&state, &alice, id, RevealVote::Yes).await.unwrap();
        submit_vote(&state, &bob, id, RevealVote::Yes).await.unwrap();

        assert!(state.session(id).is_none());
        assert!(!state.has_active_session(&alice));

        for who in ["alice", "bob"] {
            let history = state.store().history(who.into()).await.unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].session_id, id);
            assert_eq!(history[0].outcome, Outcome::Match);
        }
    }

    #[tokio::test]
    async fn a_no_resolves_immediately_without_the_second_vote() {
        let state = test_state(AppConfig::default());
        let (id, alice, bob) = activated_session(&state).await;
        end_early(&state, &alice, id).await.unwrap();

        submit_vote(&state, &bob, id, RevealVote::No).await.unwrap();

        assert!(state.session(id).is_none());
        let history = state.store().history("alice".into()).await.unwrap();
        assert_eq!(history[0].outcome, Outcome::Miss);

        // The session is gone; a late vote from the other side is a 404, not
        // a changed outcome.
        let err = submit_vote(&state, &alice, id, RevealVote::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn vote_before_voting_phase_is_rejected() {
        let state = test_state(AppConfig::default());
        let (id, alice, _) = activated_session(&state).await;

        let err = submit_vote(&state, &alice, id, RevealVote::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotInVotingState(_)));
    }

    #[tokio::test]
    async fn voting_timeout_defaults_to_miss() {
        let state = test_state(short_timers());
        let (id, alice, _) = activated_session(&state).await;
        end_early(&state, &alice, id).await.unwrap();
        submit_vote(&state, &alice, id, RevealVote::Yes).await.unwrap();

        sleep(Duration::from_millis(120)).await;

        assert!(state.session(id).is_none());
        let history = state.store().history("bob".into()).await.unwrap();
        assert_eq!(history[0].outcome, Outcome::Miss);
    }

    #[tokio::test]
    async fn unacknowledged_pairing_is_abandoned_after_the_grace_period() {
        let state = test_state(short_timers());
        let (id, alice, _) = paired_session(&state).await;
        spawn_ack_grace(&state, id);

        // Only one side acknowledges.
        acknowledge(&state, &alice, id).await.unwrap();
        sleep(Duration::from_millis(120)).await;

        assert!(state.session(id).is_none());
        let history = state.store().history("alice".into()).await.unwrap();
        assert_eq!(history[0].outcome, Outcome::Abandoned);
        assert_eq!(history[0].duration_secs, 0);
    }

    #[tokio::test]
    async fn disconnect_mid_call_abandons_not_misses() {
        let state = test_state(AppConfig::default());
        let (id, alice, bob) = activated_session(&state).await;

        abandon_on_disconnect(&state, &alice).await;

        assert!(state.session(id).is_none());
        assert!(!state.has_active_session(&bob));
        let history = state.store().history("bob".into()).await.unwrap();
        assert_eq!(history[0].outcome, Outcome::Abandoned);
    }

    #[tokio::test]
    async fn disconnect_without_a_live_session_is_a_noop() {
        let state = test_state(AppConfig::default());
        abandon_on_disconnect(&state, &identity("loner")).await;
        assert!(state.store().history("loner".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_is_scoped_to_participants() {
        let state = test_state(AppConfig::default());
        let (id, alice, _) = activated_session(&state).await;

        let summary = session_summary(&state, &alice, id).await.unwrap();
        assert_eq!(summary.id, id);
        assert!(summary.time_remaining_secs.is_some());

        let err = session_summary(&state, &identity("mallory"), id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownParticipant(_)));
    }
}
