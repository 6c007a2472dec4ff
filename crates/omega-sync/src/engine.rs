//! Local-first sync engine
//!
//! The in-memory document is the source of truth for the running session:
//! - every mutation is written through to the local mirror at once
//! - a single background worker pushes the whole document to the remote
//!   record after a quiet period, and retries while the remote is away
//! - status is published on a watch channel as a [`SyncSnapshot`]
//!
//! Callers never wait on the network except in `start`, `flush_now`,
//! `resolve_conflict` and `shutdown`.

use crate::config::{ConflictPolicy, SyncConfig};
use crate::error::SyncError;
use crate::status::{ConflictNotice, ConflictOutcome, SyncSnapshot, SyncState};
use crate::worker;
use chrono::Utc;
use omega_model::{AppState, SeedOptions};
use omega_store::{
    ConnectivityProbe, ConnectivityReport, ConnectivityStatus, LocalCache, LocalEntry,
    RemoteError, RemoteRecord, RemoteStore, SyncMeta,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How to settle a held conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Push this device's copy over the remote one
    KeepLocal,
    /// Discard local changes and load the remote copy
    TakeRemote,
}

struct Document {
    state: AppState,
    /// Bumped by every local mutation
    generation: u64,
    /// Remote revision the document was last reconciled with
    base_revision: Option<u64>,
}

pub(crate) enum FlushOutcome {
    /// Nothing pending
    Idle,
    Synced,
    /// Conflict waiting for a decision
    Held,
    Failed(RemoteError),
}

pub(crate) struct Shared {
    pub(crate) config: SyncConfig,
    cache: LocalCache,
    meta: LocalEntry<SyncMeta>,
    remote: Arc<dyn RemoteStore>,
    pub(crate) probe: Arc<dyn ConnectivityProbe>,
    doc: RwLock<Document>,
    status: watch::Sender<SyncSnapshot>,
    pub(crate) kick: Notify,
    pub(crate) stop: Notify,
    /// At most one push in flight
    flush_gate: AsyncMutex<()>,
}

fn next_revision(base: Option<u64>) -> u64 {
    base.map_or(1, |r| r + 1)
}

impl Shared {
    pub(crate) fn snapshot(&self) -> SyncSnapshot {
        self.status.borrow().clone()
    }

    pub(crate) fn connectivity(&self) -> ConnectivityStatus {
        self.status.borrow().connectivity
    }

    pub(crate) fn set_connectivity(&self, report: &ConnectivityReport) {
        self.status.send_modify(|s| s.connectivity = report.status);
    }

    /// Mirror a freshly mutated document locally and wake the worker
    fn commit(&self, doc: &mut Document) {
        doc.generation += 1;
        self.cache.write(&doc.state);
        let cache_error = self.cache.last_error();
        self.status.send_modify(|s| {
            s.pending_write = true;
            s.local_cache_error = cache_error;
        });
        self.kick.notify_one();
        debug!(generation = doc.generation, "local change committed");
    }

    /// Push the current document if a write is pending
    pub(crate) async fn flush(&self) -> FlushOutcome {
        let _gate = self.flush_gate.lock().await;

        let snapshot = self.snapshot();
        if !snapshot.pending_write {
            return FlushOutcome::Idle;
        }
        if snapshot.has_held_conflict() {
            debug!("push skipped: conflict awaiting resolution");
            return FlushOutcome::Held;
        }

        let (record, generation, base) = {
            let doc = self.doc.read();
            (
                RemoteRecord::new(doc.state.clone(), next_revision(doc.base_revision)),
                doc.generation,
                doc.base_revision,
            )
        };
        debug!(revision = record.revision, base = ?base, "pushing document");

        match self.remote.upsert_if(&record, base).await {
            Ok(()) => {
                self.mark_synced(record.revision, generation, None);
                FlushOutcome::Synced
            }
            Err(RemoteError::Conflict { found, .. }) => {
                self.on_conflict(record, generation, base, found).await
            }
            Err(e) => self.mark_failed(e),
        }
    }

    async fn on_conflict(
        &self,
        record: RemoteRecord,
        generation: u64,
        base: Option<u64>,
        found: Option<u64>,
    ) -> FlushOutcome {
        match self.config.conflict_policy {
            ConflictPolicy::LastWriterWins => {
                warn!(base = ?base, found = ?found, "remote changed on another device; overwriting it");
                let record = RemoteRecord {
                    revision: next_revision(found),
                    ..record
                };
                match self.remote.upsert(&record).await {
                    Ok(()) => {
                        let notice = ConflictNotice::new(base, found, ConflictOutcome::Overwritten);
                        self.mark_synced(record.revision, generation, Some(notice));
                        FlushOutcome::Synced
                    }
                    Err(e) => self.mark_failed(e),
                }
            }
            ConflictPolicy::Detect => {
                warn!(base = ?base, found = ?found, "remote changed on another device; holding local write");
                let message = SyncError::ConflictHeld { found }.to_string();
                self.status.send_modify(|s| {
                    s.state = SyncState::LocalOnly;
                    s.connectivity = ConnectivityStatus::Connected;
                    s.network_blocked = false;
                    s.last_error = Some(message);
                    s.conflict = Some(ConflictNotice::new(base, found, ConflictOutcome::Held));
                });
                FlushOutcome::Held
            }
        }
    }

    fn mark_synced(&self, revision: u64, generation: u64, notice: Option<ConflictNotice>) {
        let now = Utc::now();
        let clean = {
            let mut doc = self.doc.write();
            doc.base_revision = Some(revision);
            doc.generation == generation
        };
        self.meta.write(&SyncMeta {
            revision: Some(revision),
            last_synced_at: Some(now),
        });

        self.status.send_modify(|s| {
            s.state = SyncState::Synced;
            s.connectivity = ConnectivityStatus::Connected;
            s.last_error = None;
            s.network_blocked = false;
            s.remote_revision = Some(revision);
            s.last_synced_at = Some(now);
            // edits made while the push was in flight still need a push
            if clean {
                s.pending_write = false;
            }
            if notice.is_some() {
                s.conflict = notice;
            }
        });
        info!(revision, "document synced");
    }

    fn mark_failed(&self, error: RemoteError) -> FlushOutcome {
        warn!(error = %error, blocked = error.is_network_block(), "push failed; keeping changes locally");
        self.status.send_modify(|s| s.record_failure(&error));
        FlushOutcome::Failed(error)
    }

    /// Point the next push at `found` and drop the held conflict
    fn rebase(&self, found: Option<u64>) {
        self.doc.write().base_revision = found;
        self.status.send_modify(|s| {
            s.conflict = None;
            s.last_error = None;
        });
    }

    fn adopt_remote(&self, record: RemoteRecord) {
        let now = Utc::now();
        let revision = record.revision;
        {
            let mut doc = self.doc.write();
            doc.state = record.state;
            doc.base_revision = Some(revision);
            doc.generation += 1;
            self.cache.write(&doc.state);
        }
        self.meta.write(&SyncMeta {
            revision: Some(revision),
            last_synced_at: Some(now),
        });
        let cache_error = self.cache.last_error();
        self.status.send_modify(|s| {
            s.state = SyncState::Synced;
            s.connectivity = ConnectivityStatus::Connected;
            s.last_error = None;
            s.network_blocked = false;
            s.pending_write = false;
            s.remote_revision = Some(revision);
            s.last_synced_at = Some(now);
            s.conflict = None;
            s.local_cache_error = cache_error;
        });
        info!(revision, "loaded remote copy");
    }
}

/// Local-first synchronization of the application document
pub struct StateSyncEngine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StateSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSyncEngine")
            .field("config", &self.shared.config)
            .field("snapshot", &self.shared.snapshot())
            .finish_non_exhaustive()
    }
}

impl StateSyncEngine {
    /// Run the startup protocol and launch the background worker
    ///
    /// 1. Probe connectivity
    /// 2. Fetch the remote record; if present it wins and is mirrored locally
    /// 3. Otherwise load the local mirror, or seed a fresh document and
    ///    persist it at once
    ///
    /// Never fails: without a remote the engine starts `LOCAL_ONLY` with a
    /// pending write. Must be called inside a tokio runtime.
    pub async fn start(
        config: SyncConfig,
        cache: LocalCache,
        meta: LocalEntry<SyncMeta>,
        remote: Arc<dyn RemoteStore>,
        probe: Arc<dyn ConnectivityProbe>,
        seed: &SeedOptions,
    ) -> Self {
        let report = probe.probe().await;
        debug!(status = %report.status, "startup probe");

        let mut snapshot = SyncSnapshot {
            connectivity: report.status,
            ..SyncSnapshot::default()
        };

        let (state, base_revision) = match remote.fetch().await {
            Ok(Some(record)) => {
                if let Err(e) = record.state.validate() {
                    warn!(error = %e, "remote document violates invariants; loading it anyway");
                }
                let now = Utc::now();
                cache.write(&record.state);
                meta.write(&SyncMeta {
                    revision: Some(record.revision),
                    last_synced_at: Some(now),
                });
                snapshot.state = SyncState::Synced;
                snapshot.connectivity = ConnectivityStatus::Connected;
                snapshot.remote_revision = Some(record.revision);
                snapshot.last_synced_at = Some(now);
                info!(revision = record.revision, "loaded remote document");
                (record.state, Some(record.revision))
            }
            Ok(None) => {
                info!("no remote document yet");
                snapshot.state = SyncState::LocalOnly;
                snapshot.connectivity = ConnectivityStatus::Connected;
                (load_local_or_seed(&cache, seed), None)
            }
            Err(e) => {
                warn!(error = %e, "remote fetch failed; working from this device");
                snapshot.record_failure(&e);
                if !report.status.is_healthy() {
                    snapshot.connectivity = report.status;
                }
                let last = meta.read().unwrap_or_default();
                snapshot.remote_revision = last.revision;
                snapshot.last_synced_at = last.last_synced_at;
                (load_local_or_seed(&cache, seed), last.revision)
            }
        };

        snapshot.pending_write = snapshot.state != SyncState::Synced;
        snapshot.local_cache_error = cache.last_error();
        info!(state = ?snapshot.state, connectivity = %snapshot.connectivity, "sync engine started");

        let pending = snapshot.pending_write;
        let (status, _) = watch::channel(snapshot);
        let shared = Arc::new(Shared {
            config,
            cache,
            meta,
            remote,
            probe,
            doc: RwLock::new(Document {
                state,
                generation: 0,
                base_revision,
            }),
            status,
            kick: Notify::new(),
            stop: Notify::new(),
            flush_gate: AsyncMutex::new(()),
        });

        let worker = tokio::spawn(worker::run(Arc::clone(&shared)));
        if pending {
            shared.kick.notify_one();
        }

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Current status
    #[must_use]
    pub fn snapshot(&self) -> SyncSnapshot {
        self.shared.snapshot()
    }

    /// Status updates as they happen
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.shared.status.subscribe()
    }

    /// Copy of the document
    #[must_use]
    pub fn state(&self) -> AppState {
        self.shared.doc.read().state.clone()
    }

    /// Read the document without copying it
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.shared.doc.read().state)
    }

    /// Apply a mutation, mirror it locally and schedule a push
    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut doc = self.shared.doc.write();
        let out = f(&mut doc.state);
        self.shared.commit(&mut doc);
        out
    }

    /// Apply a fallible mutation; nothing changes unless it returns `Ok`
    ///
    /// # Errors
    /// Whatever `f` returns.
    pub fn try_update<R, E>(&self, f: impl FnOnce(&mut AppState) -> Result<R, E>) -> Result<R, E> {
        let mut doc = self.shared.doc.write();
        let mut draft = doc.state.clone();
        let out = f(&mut draft)?;
        doc.state = draft;
        self.shared.commit(&mut doc);
        Ok(out)
    }

    /// Push pending changes now instead of waiting for the quiet period
    ///
    /// # Errors
    /// - `SyncError::Remote` if the push failed (a retry is scheduled)
    /// - `SyncError::ConflictHeld` while a conflict awaits resolution
    pub async fn flush_now(&self) -> Result<(), SyncError> {
        match self.shared.flush().await {
            FlushOutcome::Idle | FlushOutcome::Synced => Ok(()),
            FlushOutcome::Held => Err(SyncError::ConflictHeld {
                found: self.snapshot().conflict.and_then(|c| c.found),
            }),
            FlushOutcome::Failed(e) => {
                // let the worker pick up the retry cadence
                self.shared.kick.notify_one();
                Err(e.into())
            }
        }
    }

    /// Settle a held conflict
    ///
    /// # Errors
    /// - `SyncError::NoConflict` if no write is held
    /// - `SyncError::Remote` if the remote cannot be read or written
    pub async fn resolve_conflict(&self, resolution: ConflictResolution) -> Result<(), SyncError> {
        if !self.snapshot().has_held_conflict() {
            return Err(SyncError::NoConflict);
        }

        let remote = self.shared.remote.fetch().await?;
        info!(?resolution, remote_revision = ?remote.as_ref().map(|r| r.revision), "resolving conflict");

        match (resolution, remote) {
            (ConflictResolution::TakeRemote, Some(record)) => {
                self.shared.adopt_remote(record);
                Ok(())
            }
            (ConflictResolution::KeepLocal, remote) | (ConflictResolution::TakeRemote, remote @ None) => {
                self.shared.rebase(remote.map(|r| r.revision));
                self.flush_now().await
            }
        }
    }

    /// Clear an informational conflict notice; held conflicts stay
    pub fn acknowledge_conflict(&self) {
        self.shared.status.send_modify(|s| {
            if !s.has_held_conflict() {
                s.conflict = None;
            }
        });
    }

    /// Push anything pending, then stop the worker
    pub async fn shutdown(mut self) {
        match self.shared.flush().await {
            FlushOutcome::Failed(e) => {
                warn!(error = %e, "final push failed; changes remain on this device");
            }
            FlushOutcome::Held => warn!("final push held by an unresolved conflict"),
            FlushOutcome::Idle | FlushOutcome::Synced => {}
        }

        self.shared.stop.notify_one();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "sync worker ended abnormally");
            }
        }
        info!("sync engine stopped");
    }
}

impl Drop for StateSyncEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

fn load_local_or_seed(cache: &LocalCache, seed: &SeedOptions) -> AppState {
    if let Some(state) = cache.read() {
        info!("loaded document from this device");
        return state;
    }
    let state = AppState::seed(seed);
    cache.write(&state);
    info!(month = %seed.month, "seeded new document");
    state
}
