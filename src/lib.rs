//! Client-side engine for backup-job analysis tasks.
//!
//! An analysis task is a multi-stage diagnostic pipeline that runs on a
//! remote agent: job details are fetched, automated triage decides whether
//! they suffice, deeper logs are collected if not, and an AI analysis is
//! attached at the end. This crate starts such a task, tracks its record
//! until it reaches a terminal status, and turns each record into one
//! user-facing status and message.
//!
//! # Overview
//!
//! ```text
//! TaskOrchestrator::start(job_id)
//!     -> TaskApi::create_analysis_task      (once, failure is fatal)
//!     -> PollScheduler::begin               (fixed-rate TaskApi::fetch_task)
//!         -> state::derive(record)          (pure decision table)
//!         -> WorkflowSnapshot               (watch channel to the presenter)
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Task record wire types and invariants
//! - [`state`] - Derivation of the display status
//! - [`client`] - The [`TaskApi`] seam and its HTTP implementation
//! - [`poll`] - Cancellable fixed-rate polling with stale-response rejection
//! - [`orchestrator`] - Workflow lifecycle and snapshot publishing
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use analysis_tasks::{EngineConfig, TaskOrchestrator};
//!
//! let config = EngineConfig::from_env()?;
//! let orchestrator = TaskOrchestrator::from_config(&config)?;
//! let record = orchestrator.start("4711").await?;
//! println!("task {} created", record.id);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod state;
pub mod types;

#[cfg(feature = "logging")]
pub mod logging;

// Re-exports for ergonomic access
pub use client::{ApiConfig, TaskApi};
#[cfg(feature = "http-client")]
pub use client::HttpTaskApi;
pub use config::EngineConfig;
pub use error::{ApiError, Error, Result};
pub use orchestrator::{TaskOrchestrator, WorkflowSnapshot};
pub use poll::{
    OverlapPolicy, PollCallbacks, PollConfig, PollHandle, PollObserver, PollOutcome,
    PollScheduler, PollingError,
};
pub use state::{derive, DerivedState, DisplayStatus, Phase};
pub use types::{
    AiAnalysis, RecordError, TaskId, TaskRecord, TaskResult, TaskStatus, TaskType,
    TriageDecision,
};
