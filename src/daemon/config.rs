//! Daemon connection configuration
//!
//! Loaded from a JSON file; every key is optional and falls back to the
//! default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default node RPC endpoint
pub const DEFAULT_URL: &str = "http://127.0.0.1:18081";

/// Byte budget of one ranged block request
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 3_000_000;

/// Headers fetched per window while planning ranged requests
pub const DEFAULT_HEADERS_PER_REQUEST: u64 = 750;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How to reach and query a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    pub max_request_bytes: u64,
    pub headers_per_request: u64,
    /// Interval between tip checks while block listeners are registered
    pub poll_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            timeout_ms: 30_000,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            headers_per_request: DEFAULT_HEADERS_PER_REQUEST,
            poll_interval_ms: 5_000,
        }
    }
}

impl DaemonConfig {
    /// Config for `url` with every other setting at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: DaemonConfig = serde_json::from_str(&json)?;
        config.validate()?;
        log::debug!("Loaded daemon config from {}", path.display());
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!("url '{}' is not http(s)", self.url)));
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::Invalid("max_request_bytes must be positive".to_string()));
        }
        if self.headers_per_request == 0 {
            return Err(ConfigError::Invalid("headers_per_request must be positive".to_string()));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::Invalid("password given without username".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Endpoint URL for `path`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
