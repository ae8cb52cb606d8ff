//! Remote task endpoints.
//!
//! The engine talks to the backend through the [`TaskApi`] trait, which
//! covers exactly the two operations the workflow needs:
//!
//! - `POST /jobs/{subject_id}/analysis-tasks` creates a task
//!   ([`TaskApi::create_analysis_task`]). Any failure is fatal for the
//!   workflow.
//! - `GET /agent-tasks/{task_id}` reads the current record
//!   ([`TaskApi::fetch_task`]). Failures are transient.
//!
//! [`HttpTaskApi`] is the reqwest-backed implementation; tests and embedders
//! can provide their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use analysis_tasks::client::{ApiConfig, HttpTaskApi, TaskApi};
//!
//! let api = HttpTaskApi::new(ApiConfig::new("https://dashboard.example.com/api/v1"))?;
//! let record = api.create_analysis_task("4711").await?;
//! let latest = api.fetch_task(&record.id).await?;
//! ```

mod config;
#[cfg(feature = "http-client")]
mod http;

pub use config::ApiConfig;
#[cfg(feature = "http-client")]
pub use http::HttpTaskApi;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ApiError;
use crate::types::{TaskId, TaskRecord};

/// The two remote operations the workflow engine consumes.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Creates an analysis task scoped to `subject_id` (a job id).
    ///
    /// Called exactly once per workflow start; never retried.
    async fn create_analysis_task(&self, subject_id: &str) -> Result<TaskRecord, ApiError>;

    /// Fetches the current record of a task.
    async fn fetch_task(&self, task_id: &TaskId) -> Result<TaskRecord, ApiError>;
}

#[async_trait]
impl<T: TaskApi + ?Sized> TaskApi for Arc<T> {
    async fn create_analysis_task(&self, subject_id: &str) -> Result<TaskRecord, ApiError> {
        (**self).create_analysis_task(subject_id).await
    }

    async fn fetch_task(&self, task_id: &TaskId) -> Result<TaskRecord, ApiError> {
        (**self).fetch_task(task_id).await
    }
}
