use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::queue::{EnqueueRequest, QueueStatusResponse, QueueTicketResponse},
    error::AppError,
    services::{identity, queue_service},
    state::SharedState,
};

/// Matchmaking queue endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/queue", post(enqueue))
        .route("/queue/{ticket}", get(queue_status).delete(cancel))
}

/// Join the matchmaking queue with optional preferences.
#[utoipa::path(
    post,
    path = "/queue",
    tag = "queue",
    params(("x-identity-token" = String, Header, description = "Opaque authenticated identifier")),
    request_body = EnqueueRequest,
    responses(
        (status = 200, description = "Entry accepted", body = QueueTicketResponse),
        (status = 401, description = "Missing or malformed identity token"),
        (status = 409, description = "Identity already queued or in a live session"),
    )
)]
pub async fn enqueue(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(request)): Valid<Json<EnqueueRequest>>,
) -> Result<Json<QueueTicketResponse>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    let preferences = request.preferences.unwrap_or_default().into();
    Ok(Json(
        queue_service::enqueue(&state, &identity, preferences).await?,
    ))
}

/// Poll a queue ticket: queued, matched, or timed out.
#[utoipa::path(
    get,
    path = "/queue/{ticket}",
    tag = "queue",
    params(
        ("x-identity-token" = String, Header, description = "Opaque authenticated identifier"),
        ("ticket" = Uuid, Path, description = "Ticket returned on enqueue"),
    ),
    responses(
        (status = 200, description = "Current ticket status", body = QueueStatusResponse),
        (status = 404, description = "Unknown ticket"),
        (status = 408, description = "The wait exceeded the queue bound"),
    )
)]
pub async fn queue_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(ticket): Path<Uuid>,
) -> Result<Json<QueueStatusResponse>, AppError> {
    identity::authorize(state.verifier(), &headers)?;
    Ok(Json(queue_service::poll(&state, ticket).await?))
}

/// Leave the queue before being paired.
#[utoipa::path(
    delete,
    path = "/queue/{ticket}",
    tag = "queue",
    params(
        ("x-identity-token" = String, Header, description = "Opaque authenticated identifier"),
        ("ticket" = Uuid, Path, description = "Ticket returned on enqueue"),
    ),
    responses(
        (status = 204, description = "Entry removed or already resolved"),
        (status = 404, description = "Unknown ticket"),
    )
)]
pub async fn cancel(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(ticket): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    identity::authorize(state.verifier(), &headers)?;
    queue_service::cancel(&state, ticket).await?;
    Ok(StatusCode::NO_CONTENT)
}
