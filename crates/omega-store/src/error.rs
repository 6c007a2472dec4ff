//! Persistence errors
//!
//! - `RemoteError` covers everything that can go wrong talking to the shared
//!   record. It is `Clone` so the sync layer can keep the last one around.
//! - `CacheError` covers the device-local key/value storage.

/// Shared-record failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Request never reached the server (DNS, connect, TLS, blocked by an
    /// extension or firewall)
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    /// No answer within the request timeout
    #[error("remote request timed out")]
    Timeout,

    /// Server answered with an error status
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response body was not the expected shape
    #[error("failed to decode remote response: {0}")]
    Decode(String),

    /// Stored revision moved since the last read
    #[error("remote revision conflict: expected {expected:?}, found {found:?}")]
    Conflict {
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// No remote endpoint configured
    #[error("remote store is not configured")]
    NotConfigured,
}

impl RemoteError {
    /// Whether the failure looks like the client is cut off from the
    /// endpoint, as opposed to the server misbehaving
    #[inline]
    #[must_use]
    pub fn is_network_block(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::NotConfigured)
    }

    /// Whether trying again later could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::Conflict { .. } | Self::NotConfigured => false,
        }
    }

    /// Short human-readable diagnostic for status displays
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Unreachable(_) | Self::NotConfigured => {
                "connection blocked: check ad-blockers, VPN or firewall".to_string()
            }
            Self::Timeout => "server did not answer in time".to_string(),
            Self::Rejected { status, .. } => format!("server error ({status})"),
            Self::Decode(_) => "server sent an unexpected response".to_string(),
            Self::Conflict { .. } => "another device saved changes first".to_string(),
        }
    }
}

/// Device-local storage failures
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Filesystem failure
    #[error("local storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored value could not be decoded
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Backend refused the write (quota, read-only medium)
    #[error("local storage unavailable: {0}")]
    Unavailable(String),
}
