pub mod queue;
pub mod session;
mod sse;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::SessionStore,
    services::identity::{AuthorizedIdentity, SharedVerifier},
    state::{queue::MatchmakingPool, session::Session},
};

pub use self::sse::{SseHub, SseRegistry};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// What became of a queue ticket after it left the waiting pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    /// The ticket was paired into the given session.
    Matched(Uuid),
    /// The ticket waited beyond the configured bound, evicted at this instant.
    TimedOut(OffsetDateTime),
}

/// Central application state holding the queue pool, live sessions, and the
/// per-identity notification hubs.
pub struct AppState {
    config: AppConfig,
    verifier: SharedVerifier,
    store: Arc<dyn SessionStore>,
    pool: Mutex<MatchmakingPool>,
    sessions: DashMap<Uuid, Arc<Mutex<Session>>>,
    /// Identity -> live session index enforcing at most one active session
    /// per identity.
    active: DashMap<String, Uuid>,
    /// Tickets that left the pool, kept so status polls can still answer.
    tickets: DashMap<Uuid, TicketState>,
    sse: SseRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        verifier: SharedVerifier,
        store: Arc<dyn SessionStore>,
    ) -> SharedState {
        let sse = SseRegistry::new(config.sse_capacity);
        Arc::new(Self {
            config,
            verifier,
            store,
            pool: Mutex::new(MatchmakingPool::new()),
            sessions: DashMap::new(),
            active: DashMap::new(),
            tickets: DashMap::new(),
            sse,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Identity gate verifier.
    pub fn verifier(&self) -> &dyn crate::services::identity::IdentityVerifier {
        self.verifier.as_ref()
    }

    /// Session record store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Lock guarding the FIFO matchmaking pool.
    ///
    /// Enqueue, cancel, eviction, and pairing all run under this lock, which
    /// is what makes pairing atomic with respect to concurrent mutations.
    pub fn pool(&self) -> &Mutex<MatchmakingPool> {
        &self.pool
    }

    /// Per-identity SSE hub registry.
    pub fn sse(&self) -> &SseRegistry {
        &self.sse
    }

    /// Register a freshly paired session, indexing both participants.
    pub fn register_session(&self, session: Session) -> (Uuid, Arc<Mutex<Session>>) {
        let id = session.id;
        for participant in session.participants() {
            self.active.insert(participant.as_str().to_string(), id);
        }
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, handle.clone());
        (id, handle)
    }

    /// Look up a live session by identifier.
    pub fn session(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Live session the identity currently participates in, if any.
    pub fn active_session_id(&self, identity: &AuthorizedIdentity) -> Option<Uuid> {
        self.active.get(identity.as_str()).map(|entry| *entry.value())
    }

    /// Whether the identity currently participates in a live session.
    pub fn has_active_session(&self, identity: &AuthorizedIdentity) -> bool {
        self.active.contains_key(identity.as_str())
    }

    /// Remember what happened to a ticket that left the waiting pool.
    pub fn mark_ticket(&self, ticket: Uuid, state: TicketState) {
        self.tickets.insert(ticket, state);
    }

    /// Resolution of a ticket that is no longer waiting, if known.
    pub fn ticket_state(&self, ticket: Uuid) -> Option<TicketState> {
        self.tickets.get(&ticket).map(|entry| *entry.value())
    }

    /// Forget a ticket once its resolution has been delivered.
    pub fn clear_ticket(&self, ticket: Uuid) {
        self.tickets.remove(&ticket);
    }

    /// Drop timed-out markers older than `retention`.
    ///
    /// A client that walked away without polling never collects its timeout,
    /// so the markers cannot wait for delivery forever. `Matched` markers are
    /// untouched; they are released by [`AppState::remove_session`].
    pub fn purge_stale_tickets(&self, now: OffsetDateTime, retention: Duration) {
        self.tickets.retain(|_, state| match state {
            TicketState::Matched(_) => true,
            TicketState::TimedOut(evicted_at) => now - *evicted_at < retention,
        });
    }

    /// Tear down a terminal session: drop the live entry, release both
    /// participants from the active index, and forget tickets that pointed
    /// at it.
    pub fn remove_session(&self, id: Uuid) {
        self.sessions.remove(&id);
        self.active.retain(|_, session_id| *session_id != id);
        self.tickets
            .retain(|_, state| !matches!(state, TicketState::Matched(sid) if *sid == id));
    }
}
