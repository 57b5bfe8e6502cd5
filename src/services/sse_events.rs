use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::sse::{
        AbandonedEvent, CallActiveEvent, MatchedEvent, QueuedEvent, ResolvedEvent, ServerEvent,
        VotingEvent,
    },
    services::identity::AuthorizedIdentity,
    state::{SharedState, state_machine::Outcome},
};

const EVENT_QUEUED: &str = "QUEUED";
const EVENT_MATCHED: &str = "MATCHED";
const EVENT_ACTIVE: &str = "ACTIVE";
const EVENT_VOTING: &str = "VOTING";
const EVENT_RESOLVED: &str = "RESOLVED";
const EVENT_ABANDONED: &str = "ABANDONED";

/// Confirm to a waiting identity that its queue entry was accepted.
pub fn broadcast_queued(state: &SharedState, identity: &AuthorizedIdentity, ticket: Uuid) {
    let payload = QueuedEvent { ticket };
    send_event(state, &[identity], EVENT_QUEUED, &payload);
}

/// Tell both sides of a fresh pairing which session they joined.
pub fn broadcast_matched(
    state: &SharedState,
    participants: &[&AuthorizedIdentity],
    session_id: Uuid,
) {
    let payload = MatchedEvent { session_id };
    send_event(state, participants, EVENT_MATCHED, &payload);
}

/// Announce that both participants acknowledged and the call started.
pub fn broadcast_call_active(
    state: &SharedState,
    participants: &[&AuthorizedIdentity],
    session_id: Uuid,
    time_remaining_secs: u64,
) {
    let payload = CallActiveEvent {
        session_id,
        time_remaining_secs,
    };
    send_event(state, participants, EVENT_ACTIVE, &payload);
}

/// Announce that the call ended and votes are now collected.
pub fn broadcast_voting(
    state: &SharedState,
    participants: &[&AuthorizedIdentity],
    session_id: Uuid,
) {
    let payload = VotingEvent { session_id };
    send_event(state, participants, EVENT_VOTING, &payload);
}

/// Deliver the final vote-derived outcome to both participants.
pub fn broadcast_resolved(
    state: &SharedState,
    participants: &[&AuthorizedIdentity],
    session_id: Uuid,
    outcome: Outcome,
) {
    let payload = ResolvedEvent {
        session_id,
        outcome,
    };
    send_event(state, participants, EVENT_RESOLVED, &payload);
}

/// Tell both participants the session ended before resolution.
pub fn broadcast_abandoned(
    state: &SharedState,
    participants: &[&AuthorizedIdentity],
    session_id: Uuid,
) {
    let payload = AbandonedEvent { session_id };
    send_event(state, participants, EVENT_ABANDONED, &payload);
}

fn send_event(
    state: &SharedState,
    recipients: &[&AuthorizedIdentity],
    event: &str,
    payload: &impl Serialize,
) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => {
            for identity in recipients {
                state.sse().publish(identity.as_str(), event.clone());
            }
        }
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
