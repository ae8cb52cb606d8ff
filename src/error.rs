//! Error types for the analysis-task engine.
//!
//! Two classes of failure exist at the crate boundary:
//!
//! - [`ApiError`] describes one failed remote call (transport, HTTP status,
//!   undecodable body, or a record that breaks the data-model invariants).
//! - [`Error`] is what public operations return. Task creation failures are
//!   wrapped in [`Error::Initialization`] and are never retried.
//!
//! Failed *poll* attempts are not errors in this sense: they are reported to
//! observers as [`PollingError`](crate::poll::PollingError) values and the
//! schedule keeps running.

use thiserror::Error;

use crate::types::RecordError;

/// Convenience alias used by fallible public operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single remote call to the task endpoints failed.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced an HTTP response (connect, DNS, timeout).
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable cause from the HTTP stack
        message: String,
        /// Whether the transport gave up because of its own timeout
        timeout: bool,
    },

    /// The server answered with a non-2xx status.
    #[error("server returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated for logging
        body: String,
    },

    /// The body could not be decoded into a task record.
    #[error("failed to decode task record: {0}")]
    Decode(String),

    /// The body decoded but violates a task record invariant.
    #[error("invalid task record: {0}")]
    InvalidRecord(#[from] RecordError),
}

impl ApiError {
    /// Creates a transport error that is not a timeout.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: false,
        }
    }

    /// Returns `true` if the remote side was reached and answered.
    pub fn is_server_response(&self) -> bool {
        !matches!(self, Self::Transport { .. })
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport {
                timeout: err.is_timeout(),
                message: err.to_string(),
            }
        }
    }
}

/// Errors returned by the engine's public operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Creating the analysis task failed; the workflow never started.
    #[error("failed to start analysis for subject '{subject_id}': {source}")]
    Initialization {
        /// Subject the workflow was started for
        subject_id: String,
        /// Underlying remote failure
        #[source]
        source: ApiError,
    },

    /// The workflow was stopped or restarted for another subject while the
    /// creation call was in flight; its result was discarded.
    #[error("analysis for subject '{subject_id}' was superseded before it started")]
    Superseded {
        /// Subject whose creation result was discarded
        subject_id: String,
    },

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for the expected shape.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Returns `true` for the fatal initialization class.
    pub fn is_initialization(&self) -> bool {
        matches!(self, Self::Initialization { .. })
    }
}
