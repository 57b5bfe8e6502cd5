//! Persistence layer for terminal session records.

pub mod memory;
pub mod models;

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::dao::models::SessionRecord;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over the persistence layer for terminal session records.
///
/// Records are append-only; only the session coordinator writes, every other
/// component reads.
pub trait SessionStore: Send + Sync {
    /// Persist the immutable snapshot of a terminal session.
    fn record(&self, record: SessionRecord) -> BoxFuture<'static, StorageResult<()>>;
    /// All records involving the identity, most recent first.
    fn history(&self, identity: String) -> BoxFuture<'static, StorageResult<Vec<SessionRecord>>>;
    /// Records involving the identity whose outcome was a match.
    fn matches(&self, identity: String) -> BoxFuture<'static, StorageResult<Vec<SessionRecord>>>;
    /// Probe backend availability.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
