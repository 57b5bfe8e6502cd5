use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::SessionRecord,
    dto::format_timestamp,
    state::{
        session::{RevealVote, Session},
        state_machine::{Outcome, SessionPhase},
    },
};

/// Client-visible rendering of a session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Waiting for both participants to acknowledge the pairing.
    Pending,
    /// The blind call is running.
    Active,
    /// Collecting reveal votes.
    AwaitingVotes,
    /// Votes resolved into a final outcome.
    Resolved,
    /// Ended before resolution.
    Abandoned,
}

impl From<&SessionPhase> for VisiblePhase {
    fn from(phase: &SessionPhase) -> Self {
        match phase {
            SessionPhase::Pending => VisiblePhase::Pending,
            SessionPhase::Active => VisiblePhase::Active,
            SessionPhase::AwaitingVotes => VisiblePhase::AwaitingVotes,
            SessionPhase::Resolved(_) => VisiblePhase::Resolved,
            SessionPhase::Abandoned => VisiblePhase::Abandoned,
        }
    }
}

/// Summary returned by `GET /sessions/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: Uuid,
    /// Current lifecycle phase.
    pub phase: VisiblePhase,
    /// Both participant identities.
    pub participants: Vec<String>,
    /// Seconds left on the call, present only while active. Computed from
    /// the server wall clock so both sides observe the same deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_secs: Option<u64>,
    /// Terminal outcome, present once resolved or abandoned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Pairing timestamp (RFC 3339).
    pub created_at: String,
}

impl SessionSummary {
    /// Snapshot a live session as seen at `now`.
    pub fn from_session(session: &Session, now: OffsetDateTime) -> Self {
        Self {
            id: session.id,
            phase: (&session.phase()).into(),
            participants: session
                .participants()
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            time_remaining_secs: session.time_remaining_secs(now),
            outcome: session.outcome(),
            created_at: format_timestamp(session.created_at),
        }
    }
}

/// Payload used to submit a reveal vote.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// The participant's decision.
    pub vote: RevealVote,
}

/// Generic acknowledgement body for action endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable confirmation.
    pub status: String,
}

impl ActionResponse {
    /// Standard "ok" acknowledgement.
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

/// Immutable history entry returned by `/history` and `/matches`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionRecordDto {
    /// Identifier of the recorded session.
    pub session_id: Uuid,
    /// Both participant identities.
    pub participants: Vec<String>,
    /// Terminal outcome of the session.
    pub outcome: Outcome,
    /// Call length in seconds.
    pub duration_secs: u64,
    /// Pairing timestamp (RFC 3339).
    pub created_at: String,
    /// Terminal timestamp (RFC 3339).
    pub ended_at: String,
}

impl From<SessionRecord> for SessionRecordDto {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.session_id,
            participants: record.participants.to_vec(),
            outcome: record.outcome,
            duration_secs: record.duration_secs,
            created_at: format_timestamp(record.created_at),
            ended_at: format_timestamp(record.ended_at),
        }
    }
}
