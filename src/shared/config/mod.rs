//! Sync configuration module
//!
//! Provides the configuration of the sync engine: where the remote API lives,
//! where the local cache is persisted and how often sync cycles run.
//! Values come from a TOML file, then environment overrides, then defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4000";

/// Wait before re-trying a cycle that found sync paused
pub const DEFAULT_RETRY_WAIT_SECS: u64 = 60;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_LOG_FILTER: &str = "info,journal_sync=debug";

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote API
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// SQLite file holding the durable cache
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Periodic sync interval in seconds
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Fixed wait before re-trying while sync is paused
    #[serde(default = "default_retry_wait")]
    pub retry_wait_secs: u64,

    /// `tracing-subscriber` env filter used by the daemon
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_server_url() -> String { DEFAULT_SERVER_URL.to_string() }
fn default_sync_interval() -> u64 { DEFAULT_SYNC_INTERVAL_SECS }
fn default_retry_wait() -> u64 { DEFAULT_RETRY_WAIT_SECS }
fn default_log_filter() -> String { DEFAULT_LOG_FILTER.to_string() }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            token: None,
            database_path: None,
            sync_interval_secs: default_sync_interval(),
            retry_wait_secs: default_retry_wait(),
            log_filter: default_log_filter(),
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_toml_str(&source)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `JOURNAL_SYNC_CONFIG` when set, otherwise defaults; then
    /// apply environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("JOURNAL_SYNC_CONFIG") {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Override fields from `JOURNAL_SYNC_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("JOURNAL_SYNC_API_URL") {
            self.server_url = url;
        }
        if let Ok(token) = std::env::var("JOURNAL_SYNC_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(path) = std::env::var("JOURNAL_SYNC_DB") {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("sync_interval_secs must be positive"));
        }
        Ok(())
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// Configured database path, or the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
            path.push("journal-sync");
            path.push("cache.db");
            path
        })
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    server_url: Option<String>,
    token: Option<String>,
    database_path: Option<PathBuf>,
    sync_interval_secs: Option<u64>,
    retry_wait_secs: Option<u64>,
}

impl SyncConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn sync_interval_secs(mut self, secs: u64) -> Self {
        self.sync_interval_secs = Some(secs);
        self
    }

    pub fn retry_wait_secs(mut self, secs: u64) -> Self {
        self.retry_wait_secs = Some(secs);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let config = SyncConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            token: self.token,
            database_path: self.database_path,
            sync_interval_secs: self.sync_interval_secs.unwrap_or(defaults.sync_interval_secs),
            retry_wait_secs: self.retry_wait_secs.unwrap_or(defaults.retry_wait_secs),
            log_filter: defaults.log_filter,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
