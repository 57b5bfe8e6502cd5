//! Read side of the append-only session record store.

use crate::{
    dto::session::SessionRecordDto, error::ServiceError, services::identity::AuthorizedIdentity,
    state::SharedState,
};

/// Every recorded session the identity took part in, most recent first.
pub async fn history(
    state: &SharedState,
    identity: &AuthorizedIdentity,
) -> Result<Vec<SessionRecordDto>, ServiceError> {
    let records = state.store().history(identity.as_str().to_string()).await?;
    Ok(records.into_iter().map(SessionRecordDto::from).collect())
}

/// Only the sessions that resolved into a mutual match, most recent first.
pub async fn matches(
    state: &SharedState,
    identity: &AuthorizedIdentity,
) -> Result<Vec<SessionRecordDto>, ServiceError> {
    let records = state.store().matches(identity.as_str().to_string()).await?;
    Ok(records.into_iter().map(SessionRecordDto::from).collect())
}
