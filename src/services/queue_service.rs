//! Matchmaking queue: enqueue, status polls, cancellation, and the periodic
//! pairing sweep.

use time::OffsetDateTime;
use tokio::time::interval;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::queue::{QueueStatus, QueueStatusResponse, QueueTicketResponse},
    error::ServiceError,
    services::{identity::AuthorizedIdentity, session_service, sse_events},
    state::{
        SharedState, TicketState,
        queue::{MatchmakingPool, Preferences, QueueEntry},
        session::Session,
    },
};

/// Join the matchmaking queue.
///
/// Rejected while the identity already waits or participates in a live
/// session. Pairing is attempted immediately under the same pool lock, so a
/// compatible counterpart never waits for the next sweep.
pub async fn enqueue(
    state: &SharedState,
    identity: &AuthorizedIdentity,
    preferences: Preferences,
) -> Result<QueueTicketResponse, ServiceError> {
    let mut pool = state.pool().lock().await;

    if pool.contains_identity(identity) {
        return Err(ServiceError::AlreadyQueued(format!(
            "`{identity}` is already waiting in the queue"
        )));
    }
    if state.has_active_session(identity) {
        return Err(ServiceError::AlreadyQueued(format!(
            "`{identity}` already participates in a live session"
        )));
    }

    let entry = QueueEntry::new(identity.clone(), preferences, OffsetDateTime::now_utc());
    let ticket = entry.ticket;
    pool.insert(entry);
    info!(%identity, %ticket, waiting = pool.len(), "joined the matchmaking queue");

    sse_events::broadcast_queued(state, identity, ticket);
    pair_waiting_entries(state, &mut pool);

    Ok(QueueTicketResponse { ticket })
}

/// Report where a ticket stands: still queued, matched into a session, or
/// timed out.
pub async fn poll(state: &SharedState, ticket: Uuid) -> Result<QueueStatusResponse, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let mut pool = state.pool().lock().await;

    if let Some(entry) = pool.get(ticket) {
        let waited = now - entry.enqueued_at;
        if waited >= state.config().queue_max_wait {
            pool.remove(ticket);
            return Err(ServiceError::QueueTimeout);
        }
        return Ok(QueueStatusResponse {
            status: QueueStatus::Queued,
            session_id: None,
            waited_secs: Some(waited.whole_seconds().max(0) as u64),
        });
    }
    drop(pool);

    match state.ticket_state(ticket) {
        Some(TicketState::Matched(session_id)) => Ok(QueueStatusResponse {
            status: QueueStatus::Matched,
            session_id: Some(session_id),
            waited_secs: None,
        }),
        Some(TicketState::TimedOut(_)) => {
            state.clear_ticket(ticket);
            Err(ServiceError::QueueTimeout)
        }
        None => Err(ServiceError::NotFound(format!(
            "ticket `{ticket}` not found"
        ))),
    }
}

/// Leave the queue. Cancelling a ticket that was already paired is a no-op:
/// the session exists and the client learns about it through its events.
pub async fn cancel(state: &SharedState, ticket: Uuid) -> Result<(), ServiceError> {
    let mut pool = state.pool().lock().await;
    if let Some(entry) = pool.remove(ticket) {
        info!(identity = %entry.identity, %ticket, "left the matchmaking queue");
        return Ok(());
    }
    drop(pool);

    match state.ticket_state(ticket) {
        Some(TicketState::Matched(_)) => Ok(()),
        Some(TicketState::TimedOut(_)) => {
            state.clear_ticket(ticket);
            Ok(())
        }
        None => Err(ServiceError::NotFound(format!(
            "ticket `{ticket}` not found"
        ))),
    }
}

/// Periodic sweep evicting stale entries and pairing compatible waiters whose
/// counterpart arrived between enqueues.
pub async fn pairing_loop(state: SharedState) {
    let mut tick = interval(state.config().pairing_tick);
    loop {
        tick.tick().await;
        {
            let mut pool = state.pool().lock().await;
            evict_expired_entries(&state, &mut pool);
            pair_waiting_entries(&state, &mut pool);
        }
        // Timed-out markers a client never came back for are retained one
        // more wait window, then dropped.
        state.purge_stale_tickets(OffsetDateTime::now_utc(), state.config().queue_max_wait);
    }
}

fn evict_expired_entries(state: &SharedState, pool: &mut MatchmakingPool) {
    let now = OffsetDateTime::now_utc();
    for entry in pool.drain_expired(now, state.config().queue_max_wait) {
        info!(identity = %entry.identity, ticket = %entry.ticket, "queue entry expired");
        state.mark_ticket(entry.ticket, TicketState::TimedOut(now));
    }
}

/// Pair off every mutually compatible couple currently waiting.
///
/// Runs under the pool lock held by the caller, so an identity can never be
/// paired twice or paired while cancelling.
fn pair_waiting_entries(state: &SharedState, pool: &mut MatchmakingPool) {
    while let Some((a, b)) = pool.take_oldest_pair() {
        let session = Session::new(
            a.identity.clone(),
            b.identity.clone(),
            OffsetDateTime::now_utc(),
        );
        let (session_id, _) = state.register_session(session);
        state.mark_ticket(a.ticket, TicketState::Matched(session_id));
        state.mark_ticket(b.ticket, TicketState::Matched(session_id));

        info!(%session_id, first = %a.identity, second = %b.identity, "paired");
        sse_events::broadcast_matched(state, &[&a.identity, &b.identity], session_id);
        session_service::spawn_ack_grace(state, session_id);
    }
}
