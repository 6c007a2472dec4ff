//! Omega Session - who is using the dashboard
//!
//! - [`SessionGate`] resolves an email to a team member and decides whether
//!   they authenticate, bootstrap a first password, or reset it
//! - [`CredentialPolicy`] governs new passwords and how they are stored
//! - [`SessionStore`] remembers the signed-in member on this device

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod credential;
pub mod error;
pub mod gate;
pub mod session;

pub use credential::{hash_password, is_hashed, verify_password, CredentialPolicy};
pub use error::AuthError;
pub use gate::{AccessRoute, IdentitySource, ResolvedIdentity, SessionGate};
pub use session::{Session, SessionStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for signing in
    pub use crate::{
        AccessRoute, AuthError, CredentialPolicy, ResolvedIdentity, Session, SessionGate,
        SessionStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
