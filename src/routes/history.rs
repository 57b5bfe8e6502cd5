use axum::{Json, Router, extract::State, http::HeaderMap, routing::get};

use crate::{
    dto::session::SessionRecordDto,
    error::AppError,
    services::{history_service, identity},
    state::SharedState,
};

/// Read-only endpoints over the append-only session record store.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/history", get(history))
        .route("/matches", get(matches))
}

/// Every recorded session the caller took part in, most recent first.
#[utoipa::path(
    get,
    path = "/history",
    tag = "history",
    params(("x-identity-token" = String, Header, description = "Opaque authenticated identifier")),
    responses((status = 200, description = "Recorded sessions", body = [SessionRecordDto]))
)]
pub async fn history(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionRecordDto>>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    Ok(Json(history_service::history(&state, &identity).await?))
}

/// Only the caller's sessions that resolved into a mutual match.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "history",
    params(("x-identity-token" = String, Header, description = "Opaque authenticated identifier")),
    responses((status = 200, description = "Matched sessions", body = [SessionRecordDto]))
)]
pub async fn matches(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionRecordDto>>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    Ok(Json(history_service::matches(&state, &identity).await?))
}
