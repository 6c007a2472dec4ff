//! Omega Sync - local-first synchronization
//!
//! Keeps the application document usable without a network:
//! - Startup prefers the remote copy, falls back to the local mirror, and
//!   seeds a fresh document as a last resort
//! - Mutations land in memory and on disk immediately
//! - Pushes are debounced, coalesced and retried in the background
//! - Concurrent writes from other devices are detected by revision
//!
//! # Example
//!
//! ```rust,ignore
//! use omega_sync::{StateSyncEngine, SyncConfig};
//!
//! let engine = StateSyncEngine::start(config, cache, meta, remote, probe, &seed).await;
//! engine.update(|state| state.add_role("account manager"))?;
//! println!("{:?}", engine.snapshot().indicator());
//! engine.shutdown().await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod status;
mod worker;

pub use config::{ConflictPolicy, SyncConfig};
pub use engine::{ConflictResolution, StateSyncEngine};
pub use error::SyncError;
pub use status::{
    connectivity_for, ConflictNotice, ConflictOutcome, SyncIndicator, SyncSnapshot, SyncState,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the sync engine
    pub use crate::{
        ConflictPolicy, ConflictResolution, StateSyncEngine, SyncConfig, SyncIndicator,
        SyncSnapshot, SyncState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
