//! Signed-in session and its local persistence

use chrono::{DateTime, Utc};
use omega_model::{Role, User};
use omega_store::{KeyValueBackend, LocalEntry, SESSION_KEY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Who is signed in on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Open a session for `user`
    #[must_use]
    pub fn start(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            started_at: Utc::now(),
        }
    }

    /// Check if the signed-in member is the CEO
    #[inline]
    #[must_use]
    pub fn is_ceo(&self) -> bool {
        self.role.is_ceo()
    }
}

/// Session kept across restarts under `omega_session`
#[derive(Debug)]
pub struct SessionStore {
    entry: LocalEntry<Session>,
}

impl SessionStore {
    /// Store on `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            entry: LocalEntry::new(backend, SESSION_KEY),
        }
    }

    /// Session left by the previous run, if any
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        self.entry.read()
    }

    /// Remember `session`
    pub fn save(&self, session: &Session) {
        self.entry.write(session);
        info!(user = %session.user_id, "session saved");
    }

    /// Sign out
    pub fn clear(&self) {
        self.entry.clear();
        info!("session cleared");
    }

    /// Last storage failure, if any
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.entry.last_error()
    }
}
