//! Data model shared with the remote agent pipeline.

pub mod task;

pub use task::{
    AiAnalysis, RecordError, TaskId, TaskRecord, TaskResult, TaskStatus, TaskType, TriageDecision,
};
