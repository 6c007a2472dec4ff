//! The shared remote record
//!
//! There is exactly one logical record: the whole application document plus
//! a monotonically increasing revision. Writes replace it wholesale.

use crate::error::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use omega_model::{AppState, User};
use serde::{Deserialize, Serialize};

/// Remote copy of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Whole document
    pub state: AppState,
    /// Incremented by every successful write
    #[serde(default)]
    pub revision: u64,
    /// Server-side timestamp of the last write
    pub updated_at: DateTime<Utc>,
}

impl RemoteRecord {
    /// Record for `state` at `revision`, stamped now
    #[must_use]
    pub fn new(state: AppState, revision: u64) -> Self {
        Self {
            state,
            revision,
            updated_at: Utc::now(),
        }
    }
}

/// Repository for the shared record
///
/// Nothing here retries; callers decide when to try again.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the record; `Ok(None)` when it was never written
    async fn fetch(&self) -> Result<Option<RemoteRecord>, RemoteError>;

    /// Insert or replace the record unconditionally
    async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError>;

    /// Replace the record only if its stored revision is `expected`
    /// (`None`: only if no record exists yet)
    ///
    /// The default reads then writes, which is enough for single-process
    /// stores; networked stores override it with a server-side check.
    async fn upsert_if(
        &self,
        record: &RemoteRecord,
        expected: Option<u64>,
    ) -> Result<(), RemoteError> {
        let found = self.fetch().await?.map(|r| r.revision);
        if found != expected {
            return Err(RemoteError::Conflict { expected, found });
        }
        self.upsert(record).await
    }

    /// Team roster of the remote document (empty when there is none)
    async fn fetch_team(&self) -> Result<Vec<User>, RemoteError> {
        Ok(self
            .fetch()
            .await?
            .map(|record| record.state.team)
            .unwrap_or_default())
    }
}

/// Store used when no endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRemoteStore;

#[async_trait]
impl RemoteStore for DisabledRemoteStore {
    async fn fetch(&self) -> Result<Option<RemoteRecord>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn upsert(&self, _record: &RemoteRecord) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}
