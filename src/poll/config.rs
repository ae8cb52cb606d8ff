//! Poll cadence and overlap policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// What to do when a tick fires while an earlier fetch is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Skip the tick; at most one fetch is in flight.
    #[default]
    SingleFlight,
    /// Issue the fetch anyway. Responses are ordered by sequence number and
    /// stale ones are discarded.
    Concurrent,
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleFlight => write!(f, "single_flight"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl FromStr for OverlapPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single_flight" => Ok(Self::SingleFlight),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(Error::Configuration(format!(
                "unknown overlap policy '{}', expected 'single_flight' or 'concurrent'",
                other
            ))),
        }
    }
}

/// Scheduler settings.
///
/// ```toml
/// [poll]
/// interval_ms = 7000
/// overlap = "single_flight"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fixed rate between ticks in milliseconds.
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Overlap policy for slow fetches.
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

fn default_interval() -> u64 {
    7_000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl PollConfig {
    /// Poll at the given rate.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the overlap policy.
    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Rejects a zero interval.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Configuration(
                "poll interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
