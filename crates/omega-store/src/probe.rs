//! Connectivity check
//!
//! A bounded request against the REST root, classified into four coarse
//! states. It is a heuristic: the outcome picks guidance text and retry
//! cadence, nothing else.

use crate::error::RemoteError;
use crate::http::{authorized, RemoteConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Coarse reachability of the remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityStatus {
    /// Endpoint answered normally
    Connected,
    /// Request never left the device (ad-blocker, VPN, firewall, DNS)
    Blocked,
    /// Endpoint answered with an auth, routing or server error
    ServerError,
    /// No answer in time
    #[default]
    Offline,
}

impl ConnectivityStatus {
    /// Check if writes are expected to go through
    #[inline]
    #[must_use]
    pub fn is_healthy(self) -> bool {
        self == Self::Connected
    }

    /// What the user can do about it
    #[must_use]
    pub fn guidance(self) -> &'static str {
        match self {
            Self::Connected => "Changes are saved to the cloud.",
            Self::Blocked => {
                "The connection to the server is being blocked. Disable ad-blockers, \
                 VPN or firewall rules for the database endpoint. Changes are kept on \
                 this device meanwhile."
            }
            Self::ServerError => {
                "The server rejected the request. Check the project URL and API key. \
                 Changes are kept on this device meanwhile."
            }
            Self::Offline => {
                "The server is not answering. Changes are kept on this device and \
                 will be sent when the connection returns."
            }
        }
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "CONNECTED",
            Self::Blocked => "BLOCKED",
            Self::ServerError => "SERVER_ERROR",
            Self::Offline => "OFFLINE",
        };
        f.write_str(s)
    }
}

/// Probe outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub status: ConnectivityStatus,
    /// Diagnostic detail, if any
    pub message: Option<String>,
}

impl ConnectivityReport {
    /// Report without detail
    #[inline]
    #[must_use]
    pub fn new(status: ConnectivityStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    /// With diagnostic detail
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Why a probe request produced no response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Bound elapsed
    Timeout,
    /// Failed before reaching the server
    Network,
    /// Anything else
    Other,
}

/// Classify a probe attempt: an HTTP status, or why there was none
#[must_use]
pub fn classify(outcome: Result<u16, ProbeFailure>) -> ConnectivityStatus {
    match outcome {
        Ok(401 | 403 | 404) => ConnectivityStatus::ServerError,
        Ok(status) if status >= 500 => ConnectivityStatus::ServerError,
        Ok(_) => ConnectivityStatus::Connected,
        Err(ProbeFailure::Network) => ConnectivityStatus::Blocked,
        Err(ProbeFailure::Timeout) => ConnectivityStatus::Offline,
        Err(ProbeFailure::Other) => ConnectivityStatus::ServerError,
    }
}

/// Something that can report reachability
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Run one bounded check
    async fn probe(&self) -> ConnectivityReport;
}

/// Probe against `<base>/rest/v1/`
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    config: RemoteConfig,
}

impl HttpProbe {
    /// Probe for `config`, bounded by its probe timeout
    ///
    /// An unconfigured endpoint is accepted and always reports `BLOCKED`.
    ///
    /// # Errors
    /// `RemoteError::Unreachable` if the HTTP client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.probe_timeout_ms))
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> ConnectivityReport {
        if !self.config.is_configured() {
            return ConnectivityReport::new(ConnectivityStatus::Blocked)
                .with_message("no remote endpoint configured");
        }

        let request = authorized(self.client.get(self.config.rest_root()), &self.config.api_key);
        let report = match request.send().await {
            Ok(resp) => {
                let code = resp.status().as_u16();
                let report = ConnectivityReport::new(classify(Ok(code)));
                if report.status.is_healthy() {
                    report
                } else {
                    report.with_message(format!("HTTP {code}"))
                }
            }
            Err(e) => {
                let failure = if e.is_timeout() {
                    ProbeFailure::Timeout
                } else if e.is_connect() || e.is_request() {
                    ProbeFailure::Network
                } else {
                    ProbeFailure::Other
                };
                ConnectivityReport::new(classify(Err(failure))).with_message(e.to_string())
            }
        };

        debug!(status = %report.status, "connectivity probe");
        report
    }
}

/// Probe that always answers the same
#[derive(Debug, Clone)]
pub struct FixedProbe(pub ConnectivityStatus);

#[async_trait]
impl ConnectivityProbe for FixedProbe {
    async fn probe(&self) -> ConnectivityReport {
        ConnectivityReport::new(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_responses() {
        assert_eq!(classify(Ok(200)), ConnectivityStatus::Connected);
        assert_eq!(classify(Ok(400)), ConnectivityStatus::Connected);
        assert_eq!(classify(Ok(401)), ConnectivityStatus::ServerError);
        assert_eq!(classify(Ok(403)), ConnectivityStatus::ServerError);
        assert_eq!(classify(Ok(404)), ConnectivityStatus::ServerError);
        assert_eq!(classify(Ok(502)), ConnectivityStatus::ServerError);
    }

    #[test]
    fn classify_failures() {
        assert_eq!(classify(Err(ProbeFailure::Timeout)), ConnectivityStatus::Offline);
        assert_eq!(classify(Err(ProbeFailure::Network)), ConnectivityStatus::Blocked);
        assert_eq!(classify(Err(ProbeFailure::Other)), ConnectivityStatus::ServerError);
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&ConnectivityStatus::ServerError).unwrap();
        assert_eq!(json, "\"SERVER_ERROR\"");
        assert_eq!(ConnectivityStatus::Blocked.to_string(), "BLOCKED");
    }

    #[test]
    fn builds_for_configured_endpoint() {
        let config = RemoteConfig::new("https://demo.supabase.co", "anon")
            .with_probe_timeout(Duration::from_millis(250));
        let probe = HttpProbe::new(config).unwrap();
        assert_eq!(probe.config.probe_timeout_ms, 250);
    }

    #[tokio::test]
    async fn unconfigured_probe_reports_blocked() {
        let probe = HttpProbe::new(RemoteConfig::default()).unwrap();
        let report = probe.probe().await;
        assert_eq!(report.status, ConnectivityStatus::Blocked);
        assert!(report.message.is_some());
    }
}
