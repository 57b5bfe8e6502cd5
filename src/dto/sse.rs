use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::state_machine::Outcome;

#[derive(Clone, Debug)]
/// Dispatched payload carried across per-identity SSE channels.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized event data.
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a name and pre-rendered data.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identity the stream is scoped to.
    pub identity: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when an identity's queue entry has been accepted.
pub struct QueuedEvent {
    /// Ticket identifying the queue entry.
    pub ticket: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted to both sides when a pairing has been formed.
pub struct MatchedEvent {
    /// Identifier of the freshly created session.
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once both participants acknowledged and the call started.
pub struct CallActiveEvent {
    /// Identifier of the session whose call started.
    pub session_id: Uuid,
    /// Seconds until the call deadline.
    pub time_remaining_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the call ended and the voting phase opened.
pub struct VotingEvent {
    /// Identifier of the session collecting votes.
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when votes resolved the session.
pub struct ResolvedEvent {
    /// Identifier of the resolved session.
    pub session_id: Uuid,
    /// Final outcome.
    pub outcome: Outcome,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the session ended before resolution.
pub struct AbandonedEvent {
    /// Identifier of the abandoned session.
    pub session_id: Uuid,
}
