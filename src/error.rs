use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::StorageError, state::state_machine::InvalidTransition};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The identity gate rejected the caller.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// The identity already holds a queue ticket or an active session.
    #[error("already queued: {0}")]
    AlreadyQueued(String),
    /// No pairing was found within the configured wait bound.
    #[error("queue wait timed out; re-enqueue to keep searching")]
    QueueTimeout,
    /// The participant already submitted a reveal vote for this session.
    #[error("already voted: {0}")]
    AlreadyVoted(String),
    /// The identity is not a participant of the targeted session.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),
    /// The session is not collecting votes right now.
    #[error("not in voting state: {0}")]
    NotInVotingState(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage backend failure while recording or querying sessions.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthenticated or unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current queue or session state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The client's bounded wait elapsed without a result.
    #[error("timeout: {0}")]
    Timeout(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::AlreadyQueued(message)
            | ServiceError::AlreadyVoted(message)
            | ServiceError::NotInVotingState(message)
            | ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::QueueTimeout => AppError::Timeout(ServiceError::QueueTimeout.to_string()),
            ServiceError::UnknownParticipant(message) | ServiceError::NotFound(message) => {
                AppError::NotFound(message)
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
