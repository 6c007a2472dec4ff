//! Observable sync status
//!
//! Everything a status bar needs, published as one value:
//! - lifecycle state (`LOADING`, `SYNCED`, `LOCAL_ONLY`)
//! - last probe result and last error
//! - whether a write is still waiting to go out
//! - what happened on the last revision conflict

use chrono::{DateTime, Utc};
use omega_store::{ConnectivityStatus, RemoteError};
use serde::{Deserialize, Serialize};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Startup protocol still running
    #[default]
    Loading,
    /// Last push or fetch succeeded
    Synced,
    /// Working from the local copy; the remote is behind or unreachable
    LocalOnly,
}

/// Three-way status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncIndicator {
    /// Everything is in the cloud
    Synced,
    /// Saved on this device, not yet in the cloud
    Pending,
    /// The endpoint is blocked from this device
    Blocked,
}

/// How a revision conflict ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictOutcome {
    /// Our copy replaced the other device's write
    Overwritten,
    /// Our write is on hold until resolved
    Held,
}

/// Record of a detected concurrent write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictNotice {
    /// Revision our copy was based on
    pub base: Option<u64>,
    /// Revision found on the remote
    pub found: Option<u64>,
    pub outcome: ConflictOutcome,
    pub detected_at: DateTime<Utc>,
}

impl ConflictNotice {
    /// Notice stamped now
    #[must_use]
    pub fn new(base: Option<u64>, found: Option<u64>, outcome: ConflictOutcome) -> Self {
        Self {
            base,
            found,
            outcome,
            detected_at: Utc::now(),
        }
    }

    /// Check if a write is waiting on this conflict
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.outcome == ConflictOutcome::Held
    }
}

/// Point-in-time sync status
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub state: SyncState,
    pub connectivity: ConnectivityStatus,
    /// Diagnostic of the most recent failure, cleared on success
    pub last_error: Option<String>,
    /// Most recent failure looked like a blocked connection
    pub network_blocked: bool,
    /// Local changes not yet pushed
    pub pending_write: bool,
    /// Remote revision last reconciled with
    pub remote_revision: Option<u64>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub conflict: Option<ConflictNotice>,
    /// Local mirror failure, if the last local write failed
    pub local_cache_error: Option<String>,
}

impl SyncSnapshot {
    /// Collapse into the three indicator states
    #[must_use]
    pub fn indicator(&self) -> SyncIndicator {
        if self.network_blocked || self.connectivity == ConnectivityStatus::Blocked {
            SyncIndicator::Blocked
        } else if self.state == SyncState::Synced && !self.pending_write {
            SyncIndicator::Synced
        } else {
            SyncIndicator::Pending
        }
    }

    /// Human guidance for the current situation
    #[must_use]
    pub fn guidance(&self) -> &'static str {
        if self.conflict.as_ref().is_some_and(ConflictNotice::is_held) {
            return "Another device saved changes first. Choose whether to keep this \
                    device's copy or load the cloud copy.";
        }
        match self.indicator() {
            SyncIndicator::Synced => ConnectivityStatus::Connected.guidance(),
            SyncIndicator::Blocked => ConnectivityStatus::Blocked.guidance(),
            SyncIndicator::Pending => self.connectivity.guidance(),
        }
    }

    /// Check if a held conflict is waiting for a decision
    #[inline]
    #[must_use]
    pub fn has_held_conflict(&self) -> bool {
        self.conflict.as_ref().is_some_and(ConflictNotice::is_held)
    }

    pub(crate) fn record_failure(&mut self, error: &RemoteError) {
        self.state = SyncState::LocalOnly;
        self.last_error = Some(format!("{}: {error}", error.diagnostic()));
        self.network_blocked = error.is_network_block();
        self.connectivity = connectivity_for(error);
    }
}

/// Connectivity implied by a failed remote call
#[must_use]
pub fn connectivity_for(error: &RemoteError) -> ConnectivityStatus {
    match error {
        RemoteError::Unreachable(_) | RemoteError::NotConfigured => ConnectivityStatus::Blocked,
        RemoteError::Timeout => ConnectivityStatus::Offline,
        RemoteError::Rejected { .. } | RemoteError::Decode(_) => ConnectivityStatus::ServerError,
        RemoteError::Conflict { .. } => ConnectivityStatus::Connected,
    }
}
