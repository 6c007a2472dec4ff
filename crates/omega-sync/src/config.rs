//! Sync timing and conflict settings

use omega_store::ConnectivityStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when another device wrote since our last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Overwrite the remote copy and report that it happened
    #[default]
    LastWriterWins,
    /// Hold the write until the conflict is resolved explicitly
    Detect,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period before a push
    pub debounce_ms: u64,
    /// Quiet period while the endpoint looks blocked
    pub blocked_debounce_ms: u64,
    /// Re-probe interval while changes are stranded locally
    pub retry_interval_ms: u64,
    /// Re-probe interval while the endpoint looks blocked
    pub blocked_retry_interval_ms: u64,
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1_500,
            blocked_debounce_ms: 30_000,
            retry_interval_ms: 10_000,
            blocked_retry_interval_ms: 60_000,
            conflict_policy: ConflictPolicy::LastWriterWins,
        }
    }
}

impl SyncConfig {
    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With debounce windows (normal, blocked)
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, normal: Duration, blocked: Duration) -> Self {
        self.debounce_ms = millis(normal);
        self.blocked_debounce_ms = millis(blocked);
        self
    }

    /// With retry intervals (normal, blocked)
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, normal: Duration, blocked: Duration) -> Self {
        self.retry_interval_ms = millis(normal);
        self.blocked_retry_interval_ms = millis(blocked);
        self
    }

    /// With conflict policy
    #[inline]
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Debounce window given the last known connectivity
    #[must_use]
    pub fn debounce_for(&self, status: ConnectivityStatus) -> Duration {
        Duration::from_millis(if status == ConnectivityStatus::Blocked {
            self.blocked_debounce_ms
        } else {
            self.debounce_ms
        })
    }

    /// Retry interval given the last known connectivity
    #[must_use]
    pub fn retry_for(&self, status: ConnectivityStatus) -> Duration {
        Duration::from_millis(if status == ConnectivityStatus::Blocked {
            self.blocked_retry_interval_ms
        } else {
            self.retry_interval_ms
        })
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_endpoint_backs_off() {
        let config = SyncConfig::new();
        assert_eq!(
            config.debounce_for(ConnectivityStatus::Connected),
            Duration::from_millis(1_500)
        );
        assert_eq!(
            config.debounce_for(ConnectivityStatus::Blocked),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.retry_for(ConnectivityStatus::Offline),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.retry_for(ConnectivityStatus::Blocked),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"debounce_ms": 200, "conflict_policy": "detect"}"#).unwrap();
        assert_eq!(config.debounce_ms, 200);
        assert_eq!(config.retry_interval_ms, 10_000);
        assert_eq!(config.conflict_policy, ConflictPolicy::Detect);
    }
}
