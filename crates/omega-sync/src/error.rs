//! Sync errors

use omega_store::RemoteError;

/// Errors surfaced by explicit sync requests
///
/// Background syncing never returns errors; it records them in the
/// snapshot instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Push or fetch failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A conflicting remote write is waiting for a decision
    #[error("remote copy changed on another device (revision {found:?}); resolve the conflict first")]
    ConflictHeld { found: Option<u64> },

    /// `resolve_conflict` called with nothing to resolve
    #[error("no sync conflict to resolve")]
    NoConflict,
}

impl SyncError {
    /// Whether trying again later could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            Self::ConflictHeld { .. } | Self::NoConflict => false,
        }
    }
}
