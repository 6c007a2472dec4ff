//! `omega.toml` and environment overrides

use anyhow::{Context as _, Result};
use omega_model::SeedOptions;
use omega_session::CredentialPolicy;
use omega_store::RemoteConfig;
use omega_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Config file read when `--config` is not given
pub(crate) const DEFAULT_CONFIG_FILE: &str = "omega.toml";

/// Whole client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    /// Where the local mirror and session live
    pub(crate) data_dir: PathBuf,
    pub(crate) remote: RemoteConfig,
    pub(crate) sync: SyncConfig,
    pub(crate) seed: SeedOptions,
    pub(crate) credentials: CredentialPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".omega"),
            remote: RemoteConfig::default(),
            sync: SyncConfig::default(),
            seed: SeedOptions::default(),
            credentials: CredentialPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load `path`, or `omega.toml` if present, or defaults
    ///
    /// An explicitly named file must exist.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            info!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse TOML text
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `OMEGA_REMOTE_URL`, `OMEGA_API_KEY` and `OMEGA_DATA_DIR`
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OMEGA_REMOTE_URL") {
            self.remote.base_url = url;
        }
        if let Some(key) = lookup("OMEGA_API_KEY") {
            self.remote.api_key = key;
        }
        if let Some(dir) = lookup("OMEGA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }
}
