//! In-process remote store
//!
//! Behaves like the hosted record (revisions, conditional writes, a missing
//! record on first run) and can be switched into failure modes. Used by
//! tests and by offline demos.

use crate::error::RemoteError;
use crate::remote::{RemoteRecord, RemoteStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared record kept in memory
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    record: Mutex<Option<RemoteRecord>>,
    failure: Mutex<Option<RemoteError>>,
    fetch_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Store without a record (first run)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `record`
    #[must_use]
    pub fn with_record(record: RemoteRecord) -> Self {
        let store = Self::new();
        *store.record.lock() = Some(record);
        store
    }

    /// Make every call fail as if the endpoint were blocked
    pub fn set_unreachable(&self, unreachable: bool) {
        self.fail_with(unreachable.then(|| RemoteError::Unreachable("connection refused".into())));
    }

    /// Make every call fail with `error` (`None` restores normal operation)
    pub fn fail_with(&self, error: Option<RemoteError>) {
        *self.failure.lock() = error;
    }

    /// Overwrite the record directly, as another device would
    pub fn set_record(&self, record: Option<RemoteRecord>) {
        *self.record.lock() = record;
    }

    /// Snapshot of the stored record
    #[must_use]
    pub fn current(&self) -> Option<RemoteRecord> {
        self.record.lock().clone()
    }

    /// Number of `fetch` calls so far
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of write attempts so far (conditional or not, failed or not)
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RemoteError> {
        match self.failure.lock().as_ref() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self) -> Result<Option<RemoteRecord>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.current())
    }

    async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        *self.record.lock() = Some(record.clone());
        Ok(())
    }

    async fn upsert_if(
        &self,
        record: &RemoteRecord,
        expected: Option<u64>,
    ) -> Result<(), RemoteError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let mut stored = self.record.lock();
        let found = stored.as_ref().map(|r| r.revision);
        if found != expected {
            return Err(RemoteError::Conflict { expected, found });
        }
        *stored = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omega_model::{AppState, SeedOptions};

    fn record(revision: u64) -> RemoteRecord {
        RemoteRecord::new(AppState::seed(&SeedOptions::new()), revision)
    }

    #[tokio::test]
    async fn first_run_has_no_record() {
        let store = MemoryRemoteStore::new();
        assert_eq!(store.fetch().await.unwrap(), None);
        assert!(store.fetch_team().await.unwrap().is_empty());
        assert_eq!(store.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryRemoteStore::new();
        let rec = record(1);
        store.upsert(&rec).await.unwrap();
        store.upsert(&rec).await.unwrap();
        assert_eq!(store.current(), Some(rec));
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn conditional_write_checks_revision() {
        let store = MemoryRemoteStore::new();
        store.upsert_if(&record(1), None).await.unwrap();

        let err = store.upsert_if(&record(2), None).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Conflict {
                expected: None,
                found: Some(1)
            }
        );

        store.upsert_if(&record(2), Some(1)).await.unwrap();
        assert_eq!(store.current().unwrap().revision, 2);
    }

    #[tokio::test]
    async fn unreachable_store_fails_every_call() {
        let store = MemoryRemoteStore::with_record(record(3));
        store.set_unreachable(true);
        assert!(store.fetch().await.unwrap_err().is_network_block());
        assert!(store.upsert(&record(4)).await.is_err());

        store.set_unreachable(false);
        assert_eq!(store.fetch().await.unwrap().unwrap().revision, 3);
    }
}
