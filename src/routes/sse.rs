use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{identity, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/events",
    tag = "sse",
    params(("x-identity-token" = String, Header, description = "Opaque authenticated identifier")),
    responses(
        (status = 200, description = "Per-identity event stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Missing or malformed identity token"),
    )
)]
/// Stream queue and session lifecycle events scoped to the caller's identity.
pub async fn event_stream(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let identity = identity::authorize(state.verifier(), &headers)?;
    let receiver = sse_service::subscribe(&state, &identity);
    info!(%identity, "new SSE connection");
    sse_service::broadcast_handshake(&state, &identity);
    Ok(sse_service::to_sse_stream(state, identity, receiver))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/events", get(event_stream))
}
