//! Omega Store - where the application document lives
//!
//! Two tiers:
//! - Local: a key/value mirror on this device, written through on every change
//! - Remote: one shared record, replaced wholesale, with a revision counter
//!
//! Plus a connectivity probe that tells the sync layer how reachable the
//! remote tier is.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod http;
pub mod local;
pub mod memory;
pub mod probe;
pub mod remote;

pub use error::{CacheError, RemoteError};
pub use http::{HttpRemoteStore, RemoteConfig};
pub use local::{
    FileBackend, KeyValueBackend, LocalCache, LocalEntry, MemoryBackend, SyncMeta, SESSION_KEY,
    STATE_KEY, SYNC_META_KEY,
};
pub use memory::MemoryRemoteStore;
pub use probe::{
    classify, ConnectivityProbe, ConnectivityReport, ConnectivityStatus, FixedProbe, HttpProbe,
    ProbeFailure,
};
pub use remote::{DisabledRemoteStore, RemoteRecord, RemoteStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the stores
    pub use crate::{
        ConnectivityProbe, ConnectivityStatus, KeyValueBackend, LocalCache, LocalEntry,
        RemoteError, RemoteRecord, RemoteStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
