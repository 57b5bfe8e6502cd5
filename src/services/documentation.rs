use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for BlindSpot Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::queue::enqueue,
        crate::routes::queue::queue_status,
        crate::routes::queue::cancel,
        crate::routes::session::session_summary,
        crate::routes::session::acknowledge,
        crate::routes::session::vote,
        crate::routes::session::end_call,
        crate::routes::history::history,
        crate::routes::history::matches,
        crate::routes::sse::event_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::queue::EnqueueRequest,
            crate::dto::queue::PreferencesInput,
            crate::dto::queue::QueueTicketResponse,
            crate::dto::queue::QueueStatusResponse,
            crate::dto::queue::QueueStatus,
            crate::dto::session::SessionSummary,
            crate::dto::session::VisiblePhase,
            crate::dto::session::VoteRequest,
            crate::dto::session::ActionResponse,
            crate::dto::session::SessionRecordDto,
            crate::dto::sse::Handshake,
            crate::dto::sse::QueuedEvent,
            crate::dto::sse::MatchedEvent,
            crate::dto::sse::CallActiveEvent,
            crate::dto::sse::VotingEvent,
            crate::dto::sse::ResolvedEvent,
            crate::dto::sse::AbandonedEvent,
            crate::state::session::RevealVote,
            crate::state::state_machine::Outcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "queue", description = "Matchmaking queue operations"),
        (name = "session", description = "Blind session lifecycle operations"),
        (name = "history", description = "Immutable session history"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
