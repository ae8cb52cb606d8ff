//! Connection settings for the task endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Connection settings for the backend API.
///
/// # Example Configuration
///
/// ```toml
/// [api]
/// base_url = "https://dashboard.example.com/api/v1"
/// timeout_ms = 15000
/// auth_token = "eyJhbGciOi..."
/// headers = { "X-Tenant" = "acme" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the endpoint paths are appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request transport timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Pre-issued bearer token, sent as `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_timeout() -> u64 {
    30_000 // 30 seconds
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout(),
            headers: HashMap::new(),
            auth_token: None,
        }
    }
}

impl ApiConfig {
    /// Create a configuration for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the transport timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Transport timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks that the base URL is an absolute http(s) URL and the timeout
    /// is non-zero.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            Error::Configuration(format!("invalid base_url '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Configuration(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// URL for `POST /jobs/{subject_id}/analysis-tasks`.
    pub fn create_task_url(&self, subject_id: &str) -> String {
        format!(
            "{}/jobs/{}/analysis-tasks",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(subject_id)
        )
    }

    /// URL for `GET /agent-tasks/{task_id}`.
    pub fn task_url(&self, task_id: &str) -> String {
        format!(
            "{}/agent-tasks/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(task_id)
        )
    }
}
