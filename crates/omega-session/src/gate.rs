//! Access gate
//!
//! Sign-in is two steps:
//! 1. Resolve the email against the roster (this device first, then the
//!    shared record so a member can sign in on a new device)
//! 2. Either authenticate with the stored password, or set one on first
//!    access / reset
//!
//! Setting a password is one uniform operation; whether it is a first access
//! or a reset only matters to the caller's screen flow.

use crate::credential::{verify_password, CredentialPolicy};
use crate::error::AuthError;
use crate::session::Session;
use omega_model::{normalize_email, User};
use omega_store::RemoteStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Next step after resolving an email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessRoute {
    /// Ask for the existing password
    Authenticate,
    /// First access: choose a password
    Bootstrap,
    /// Recovery: choose a new password
    Reset,
}

impl AccessRoute {
    /// Route for a normal sign-in attempt
    #[inline]
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        if user.has_credential() {
            Self::Authenticate
        } else {
            Self::Bootstrap
        }
    }
}

/// Where the member record was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentitySource {
    /// Roster on this device
    Local,
    /// Roster of the shared record
    Remote,
}

/// Outcome of identity resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub user: User,
    pub route: AccessRoute,
    pub source: IdentitySource,
}

/// Resolves identities and manages credentials
pub struct SessionGate {
    remote: Option<Arc<dyn RemoteStore>>,
    policy: CredentialPolicy,
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("remote", &self.remote.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new(CredentialPolicy::default())
    }
}

impl SessionGate {
    /// Gate that only consults the local roster
    #[must_use]
    pub fn new(policy: CredentialPolicy) -> Self {
        Self {
            remote: None,
            policy,
        }
    }

    /// With a shared roster to fall back to
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Credential rules
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Find the member behind `email`
    ///
    /// Lookup trims and ignores case. A remote failure during the fallback
    /// is logged and reported as an unknown identity.
    ///
    /// # Errors
    /// - `AuthError::UnknownIdentity` if nobody has this email
    /// - `AuthError::Inactive` if the member was deactivated
    pub async fn resolve_identity(
        &self,
        team: &[User],
        email: &str,
    ) -> Result<ResolvedIdentity, AuthError> {
        let wanted = normalize_email(email);
        if wanted.is_empty() {
            return Err(AuthError::UnknownIdentity(email.to_string()));
        }

        let (user, source) = match team.iter().find(|u| u.matches_email(&wanted)) {
            Some(user) => (user.clone(), IdentitySource::Local),
            None => (self.remote_lookup(&wanted).await?, IdentitySource::Remote),
        };

        if !user.is_active {
            info!(user = %user.id, "sign-in refused: inactive account");
            return Err(AuthError::Inactive);
        }

        let route = AccessRoute::for_user(&user);
        debug!(user = %user.id, ?route, ?source, "identity resolved");
        Ok(ResolvedIdentity {
            user,
            route,
            source,
        })
    }

    /// Resolve `email` for a password reset
    ///
    /// # Errors
    /// Same as [`SessionGate::resolve_identity`].
    pub async fn begin_reset(
        &self,
        team: &[User],
        email: &str,
    ) -> Result<ResolvedIdentity, AuthError> {
        let mut identity = self.resolve_identity(team, email).await?;
        identity.route = AccessRoute::Reset;
        Ok(identity)
    }

    /// Check a password and open a session
    ///
    /// # Errors
    /// - `AuthError::Inactive` regardless of the password
    /// - `AuthError::NoCredential` if the member must bootstrap first
    /// - `AuthError::WrongPassword`
    pub fn authenticate(&self, user: &User, supplied: &str) -> Result<Session, AuthError> {
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        let stored = match user.password.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => return Err(AuthError::NoCredential),
        };
        if !verify_password(stored, supplied) {
            warn!(user = %user.id, "sign-in refused: wrong password");
            return Err(AuthError::WrongPassword);
        }

        info!(user = %user.id, "signed in");
        Ok(Session::start(user))
    }

    /// Set a new password; returns the updated member record to persist
    ///
    /// # Errors
    /// - `AuthError::Inactive`
    /// - `AuthError::PasswordTooShort` / `AuthError::PasswordMismatch`
    /// - `AuthError::Hashing`
    pub fn set_credential(
        &self,
        user: &User,
        password: &str,
        confirmation: &str,
    ) -> Result<User, AuthError> {
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        self.policy.check(password, confirmation)?;
        info!(user = %user.id, "credential updated");
        let sealed = self.policy.seal(password)?;
        Ok(user.clone().with_password(sealed))
    }

    /// First access: set the password and sign in
    ///
    /// # Errors
    /// See [`SessionGate::set_credential`].
    pub fn bootstrap_password(
        &self,
        user: &User,
        password: &str,
        confirmation: &str,
    ) -> Result<(User, Session), AuthError> {
        let updated = self.set_credential(user, password, confirmation)?;
        let session = Session::start(&updated);
        Ok((updated, session))
    }

    /// Check a live session against the current roster
    ///
    /// # Errors
    /// `AuthError::Revoked` if the member is gone or inactive.
    pub fn revalidate(&self, session: &Session, team: &[User]) -> Result<(), AuthError> {
        match team.iter().find(|u| u.id == session.user_id) {
            Some(user) if user.is_active => Ok(()),
            _ => {
                info!(user = %session.user_id, "session revoked");
                Err(AuthError::Revoked)
            }
        }
    }

    async fn remote_lookup(&self, email: &str) -> Result<User, AuthError> {
        let unknown = || AuthError::UnknownIdentity(email.to_string());
        let Some(remote) = &self.remote else {
            return Err(unknown());
        };

        match remote.fetch_team().await {
            Ok(team) => team
                .into_iter()
                .find(|u| u.matches_email(email))
                .ok_or_else(unknown),
            Err(e) => {
                warn!(error = %e, "remote roster unavailable during sign-in");
                Err(unknown())
            }
        }
    }
}
