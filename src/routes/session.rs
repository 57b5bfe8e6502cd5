use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::session::{ActionResponse, SessionSummary, VoteRequest},
    error::AppError,
    services::{identity, session_service},
    state::SharedState,
};

/// Session lifecycle endpoints, all scoped to the session's participants.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sessions/{id}", get(session_summary))
        .route("/sessions/{id}/ack", post(acknowledge))
        .route("/sessions/{id}/vote", post(vote))
        .route("/sessions/{id}/end", post(end_call))
}

/// Snapshot a session the caller participates in.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "session",
    params(
        ("x-identity-token" = String, Header, description = "Opaque authenticated identifier"),
        ("id" = Uuid, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Current session state", body = SessionSummary),
        (status = 404, description = "Unknown session or caller not a participant"),
    )
)]
pub async fn session_summary(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    Ok(Json(
        session_service::session_summary(&state, &identity, id).await?,
    ))
}

/// Acknowledge the pairing; the call starts once both sides did.
#[utoipa::path(
    post,
    path = "/sessions/{id}/ack",
    tag = "session",
    params(
        ("x-identity-token" = String, Header, description = "Opaque authenticated identifier"),
        ("id" = Uuid, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Acknowledgement recorded", body = ActionResponse),
        (status = 404, description = "Unknown session or caller not a participant"),
        (status = 409, description = "Session already past the pending phase"),
    )
)]
pub async fn acknowledge(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    session_service::acknowledge(&state, &identity, id).await?;
    Ok(Json(ActionResponse::ok()))
}

/// Submit the caller's reveal vote.
#[utoipa::path(
    post,
    path = "/sessions/{id}/vote",
    tag = "session",
    params(
        ("x-identity-token" = String, Header, description = "Opaque authenticated identifier"),
        ("id" = Uuid, Path, description = "Session identifier"),
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = ActionResponse),
        (status = 404, description = "Unknown session or caller not a participant"),
        (status = 409, description = "Not in the voting phase, or already voted"),
    )
)]
pub async fn vote(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    session_service::submit_vote(&state, &identity, id, request.vote).await?;
    Ok(Json(ActionResponse::ok()))
}

/// End the call before the deadline and open voting.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    tag = "session",
    params(
        ("x-identity-token" = String, Header, description = "Opaque authenticated identifier"),
        ("id" = Uuid, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Call ended, voting open", body = ActionResponse),
        (status = 404, description = "Unknown session or caller not a participant"),
        (status = 409, description = "Call has not started yet"),
    )
)]
pub async fn end_call(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    session_service::end_early(&state, &identity, id).await?;
    Ok(Json(ActionResponse::ok()))
}
