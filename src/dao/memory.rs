//! In-memory session store used as the default backend.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::{
    dao::{SessionStore, StorageResult, models::SessionRecord},
    state::state_machine::Outcome,
};

/// Append-only in-memory store; records are kept in insertion order, which is
/// chronological because the coordinator records each session exactly once at
/// its terminal transition.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<Vec<SessionRecord>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn record(&self, record: SessionRecord) -> BoxFuture<'static, StorageResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            records.write().await.push(record);
            Ok(())
        })
    }

    fn history(&self, identity: String) -> BoxFuture<'static, StorageResult<Vec<SessionRecord>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let guard = records.read().await;
            Ok(guard
                .iter()
                .rev()
                .filter(|record| record.involves(&identity))
                .cloned()
                .collect())
        })
    }

    fn matches(&self, identity: String) -> BoxFuture<'static, StorageResult<Vec<SessionRecord>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let guard = records.read().await;
            Ok(guard
                .iter()
                .rev()
                .filter(|record| record.outcome == Outcome::Match && record.involves(&identity))
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
