use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::state_machine::Outcome;

/// Immutable snapshot of a session that reached a terminal state.
///
/// Created exactly once by the coordinator at resolution and never mutated
/// afterwards; the live [`Session`](crate::state::session::Session) is
/// discarded once this record exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Identifier of the session this record snapshots.
    pub session_id: Uuid,
    /// Both participant identities.
    pub participants: [String; 2],
    /// Terminal classification of the session.
    pub outcome: Outcome,
    /// How long the blind call lasted, in seconds (0 if it never started).
    pub duration_secs: u64,
    /// When the session was paired.
    pub created_at: OffsetDateTime,
    /// When the session reached its terminal state.
    pub ended_at: OffsetDateTime,
}

impl SessionRecord {
    /// Whether the identity took part in the recorded session.
    pub fn involves(&self, identity: &str) -> bool {
        self.participants.iter().any(|p| p == identity)
    }
}
