//! Engine configuration: API connection plus poll cadence.
//!
//! Loaded from a TOML file, a TOML string, or `ANALYSIS_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::client::ApiConfig;
use crate::error::{Error, Result};
use crate::poll::PollConfig;

/// Top-level configuration.
///
/// # Example Configuration File
///
/// ```toml
/// [api]
/// base_url = "https://dashboard.example.com/api/v1"
/// timeout_ms = 30000
/// auth_token = "eyJhbGciOi..."
///
/// [poll]
/// interval_ms = 7000
/// overlap = "single_flight"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backend connection.
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll scheduler settings.
    #[serde(default)]
    pub poll: PollConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// ```rust,ignore
    /// let config = EngineConfig::from_file("analysis.toml")?;
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Load configuration from environment variables, starting from the
    /// defaults:
    ///
    /// - `ANALYSIS_API_BASE_URL`
    /// - `ANALYSIS_API_TIMEOUT_MS`
    /// - `ANALYSIS_API_TOKEN`
    /// - `ANALYSIS_POLL_INTERVAL_MS`
    /// - `ANALYSIS_POLL_OVERLAP` (`single_flight` or `concurrent`)
    ///
    /// ```bash
    /// export ANALYSIS_API_BASE_URL="https://dashboard.example.com/api/v1"
    /// export ANALYSIS_POLL_INTERVAL_MS=5000
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` (an environment-like source) on `self`.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ANALYSIS_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(ms) = lookup("ANALYSIS_API_TIMEOUT_MS") {
            self.api.timeout_ms = parse_millis("ANALYSIS_API_TIMEOUT_MS", &ms)?;
        }
        if let Some(token) = lookup("ANALYSIS_API_TOKEN") {
            self.api.auth_token = Some(token);
        }
        if let Some(ms) = lookup("ANALYSIS_POLL_INTERVAL_MS") {
            self.poll.interval_ms = parse_millis("ANALYSIS_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(overlap) = lookup("ANALYSIS_POLL_OVERLAP") {
            self.poll.overlap = overlap.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.poll.validate()
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|e| {
        Error::Configuration(format!("{} must be milliseconds, got '{}': {}", key, value, e))
    })
}
