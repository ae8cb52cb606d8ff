//! Transient polling failures as seen by the presentation layer.

use serde::Serialize;
use std::fmt;

use crate::error::ApiError;
use crate::types::TaskId;

/// Message shown while polls are failing.
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Retrying...";

/// A failed poll attempt. The schedule keeps running and the next successful
/// fetch clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingError {
    /// Task being polled.
    pub task_id: TaskId,
    /// User-facing message.
    pub message: &'static str,
    /// Underlying failure, for logs and details views.
    pub cause: String,
    /// Failed attempts since the last successful fetch, including this one.
    pub consecutive_failures: u32,
}

impl PollingError {
    pub(crate) fn new(task_id: TaskId, cause: &ApiError, consecutive_failures: u32) -> Self {
        Self {
            task_id,
            message: CONNECTION_LOST_MESSAGE,
            cause: cause.to_string(),
            consecutive_failures,
        }
    }
}

impl fmt::Display for PollingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.cause)
    }
}
