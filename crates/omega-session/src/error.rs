//! Authentication errors
//!
//! One variant per cause so the UI can say exactly what went wrong.
//! None of these are retried automatically.

/// Sign-in and credential errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No team member with this email, locally or remotely
    #[error("no team member registered with {0:?}")]
    UnknownIdentity(String),

    /// Member exists but was deactivated
    #[error("account is inactive")]
    Inactive,

    /// Member has not chosen a password yet
    #[error("no password set; first access required")]
    NoCredential,

    /// Supplied password does not match
    #[error("wrong password")]
    WrongPassword,

    /// New password under the minimum length
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    /// New password and confirmation differ
    #[error("password confirmation does not match")]
    PasswordMismatch,

    /// Session user was removed or deactivated after sign-in
    #[error("session revoked: account no longer active")]
    Revoked,

    /// Password could not be hashed for storage
    #[error("failed to hash password: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Message suitable for the sign-in screen
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownIdentity(_) => "Email not found in the team roster.".to_string(),
            Self::Inactive | Self::Revoked => {
                "This account is inactive. Contact the administrator.".to_string()
            }
            Self::NoCredential => "Create a password to finish your first access.".to_string(),
            Self::WrongPassword => "Incorrect password.".to_string(),
            Self::PasswordTooShort { min } => {
                format!("The password must have at least {min} characters.")
            }
            Self::PasswordMismatch => "The passwords do not match.".to_string(),
            Self::Hashing(_) => "The password could not be saved. Try again.".to_string(),
        }
    }

    /// Whether the error is about the new password the user typed
    #[inline]
    #[must_use]
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PasswordTooShort { .. } | Self::PasswordMismatch)
    }
}
