//! reqwest-backed [`TaskApi`] implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Response;

use super::{ApiConfig, TaskApi};
use crate::error::{ApiError, Error, Result};
use crate::types::{TaskId, TaskRecord};

/// Longest error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the task endpoints.
///
/// Static headers and the bearer token from [`ApiConfig`] are installed as
/// default headers; the configured timeout is the only per-request timeout.
pub struct HttpTaskApi {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for HttpTaskApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTaskApi")
            .field("base_url", &self.config.base_url)
            .field("timeout_ms", &self.config.timeout_ms)
            .field("has_auth_token", &self.config.auth_token.is_some())
            .finish()
    }
}

impl HttpTaskApi {
    /// Build a client from configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::Configuration(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::Configuration(format!(
                    "invalid value for header '{}': {}",
                    name.as_str(),
                    e
                ))
            })?;
            headers.insert(name, value);
        }
        if let Some(token) = &config.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Configuration(format!("invalid auth token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn create_analysis_task(
        &self,
        subject_id: &str,
    ) -> std::result::Result<TaskRecord, ApiError> {
        let url = self.config.create_task_url(subject_id);
        tracing::debug!(subject_id, "Creating analysis task at {}", url);

        let response = self.http_client.post(&url).send().await?;
        read_record(response).await
    }

    async fn fetch_task(&self, task_id: &TaskId) -> std::result::Result<TaskRecord, ApiError> {
        let url = self.config.task_url(task_id.as_str());
        tracing::debug!(task_id = %task_id, "Fetching task record from {}", url);

        let response = self.http_client.get(&url).send().await?;
        read_record(response).await
    }
}

/// Turns a response into a validated record. Any non-2xx status is an error.
async fn read_record(response: Response) -> std::result::Result<TaskRecord, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: truncate(body),
        });
    }

    let record: TaskRecord = response.json().await?;
    record.validate()?;
    Ok(record)
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
