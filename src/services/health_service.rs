use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a health payload, probing the session store.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Err(err) = state.store().health_check().await {
        warn!(error = %err, "session store health check failed");
        return HealthResponse::degraded();
    }
    HealthResponse::ok()
}
