//! PostgREST (Supabase) remote store
//!
//! The record lives in one table row:
//!
//! | column       | type          |
//! |--------------|---------------|
//! | `id`         | int, always 1 |
//! | `state`      | jsonb         |
//! | `revision`   | int8          |
//! | `updated_at` | timestamptz   |
//!
//! Conditional writes are a `PATCH` filtered on the expected revision; an
//! empty representation means someone else wrote first.

use crate::error::RemoteError;
use crate::remote::{RemoteRecord, RemoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use omega_model::AppState;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const CLIENT_INFO: &str = concat!("omega-store/", env!("CARGO_PKG_VERSION"));

/// Remote endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co` (empty: not configured)
    pub base_url: String,
    /// Anonymous API key
    pub api_key: String,
    /// Table holding the record
    pub table: String,
    /// Primary key of the record row
    pub record_id: i64,
    /// Bound on record reads and writes
    pub timeout_ms: u64,
    /// Bound on the connectivity check
    pub probe_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            table: "omega_store".to_string(),
            record_id: 1,
            timeout_ms: 15_000,
            probe_timeout_ms: 4_000,
        }
    }
}

impl RemoteConfig {
    /// Config for an endpoint
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// With table name
    #[inline]
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With connectivity check timeout
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Check if an endpoint is set
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    /// REST root, `<base>/rest/v1/`
    #[must_use]
    pub fn rest_root(&self) -> String {
        format!("{}/rest/v1/", self.base_url.trim().trim_end_matches('/'))
    }

    /// Table endpoint
    #[must_use]
    pub fn table_url(&self) -> String {
        format!("{}{}", self.rest_root(), self.table)
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    state: AppState,
    #[serde(default)]
    revision: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl From<Row> for RemoteRecord {
    fn from(row: Row) -> Self {
        Self {
            state: row.state,
            revision: row.revision,
            updated_at: row.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize)]
struct RowRef<'a> {
    id: i64,
    state: &'a AppState,
    revision: u64,
    updated_at: DateTime<Utc>,
}

/// Shared record over PostgREST
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    config: RemoteConfig,
}

impl HttpRemoteStore {
    /// Build a store for `config`
    ///
    /// # Errors
    /// `RemoteError::NotConfigured` without a base URL; `Unreachable` if the
    /// HTTP client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        if !config.is_configured() {
            return Err(RemoteError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Endpoint settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn request(&self, method: Method, query: &str) -> RequestBuilder {
        let url = format!("{}?{query}", self.config.table_url());
        authorized(self.client.request(method, url), &self.config.api_key)
    }

    fn row<'a>(&self, record: &'a RemoteRecord) -> RowRef<'a> {
        RowRef {
            id: self.config.record_id,
            state: &record.state,
            revision: record.revision,
            updated_at: record.updated_at,
        }
    }

    fn select_query(&self) -> String {
        format!(
            "id=eq.{}&select=state,revision,updated_at",
            self.config.record_id
        )
    }

    async fn current_revision(&self) -> Option<u64> {
        self.fetch().await.ok().flatten().map(|r| r.revision)
    }
}

/// Attach the key headers every PostgREST call needs
pub(crate) fn authorized(builder: RequestBuilder, api_key: &str) -> RequestBuilder {
    builder
        .header("apikey", api_key)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("X-Client-Info", CLIENT_INFO)
}

/// Map a transport-level failure
pub(crate) fn transport_error(e: &reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_decode() {
        RemoteError::Decode(e.to_string())
    } else {
        // connect, DNS, TLS, or a request the browser-equivalent would refuse
        RemoteError::Unreachable(e.to_string())
    }
}

async fn ensure_success(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode_rows(resp: Response) -> Result<Vec<Row>, RemoteError> {
    resp.json::<Vec<Row>>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    #[instrument(skip(self), fields(table = %self.config.table))]
    async fn fetch(&self) -> Result<Option<RemoteRecord>, RemoteError> {
        let resp = self
            .request(Method::GET, &self.select_query())
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let rows = decode_rows(ensure_success(resp).await?).await?;
        debug!(rows = rows.len(), "fetched remote record");
        Ok(rows.into_iter().next().map(RemoteRecord::from))
    }

    #[instrument(skip(self, record), fields(revision = record.revision))]
    async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::POST, "on_conflict=id")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&self.row(record))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        ensure_success(resp).await?;
        debug!("remote record replaced");
        Ok(())
    }

    #[instrument(skip(self, record), fields(revision = record.revision, expected = ?expected))]
    async fn upsert_if(
        &self,
        record: &RemoteRecord,
        expected: Option<u64>,
    ) -> Result<(), RemoteError> {
        let builder = match expected {
            Some(revision) => self
                .request(
                    Method::PATCH,
                    &format!("id=eq.{}&revision=eq.{revision}", self.config.record_id),
                )
                .header("Prefer", "return=representation"),
            None => self
                .request(Method::POST, "on_conflict=id")
                .header("Prefer", "resolution=ignore-duplicates,return=representation"),
        };

        let resp = builder
            .json(&self.row(record))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let written = decode_rows(ensure_success(resp).await?).await?;

        if written.is_empty() {
            let found = self.current_revision().await;
            return Err(RemoteError::Conflict { expected, found });
        }
        debug!("remote record replaced conditionally");
        Ok(())
    }
}
