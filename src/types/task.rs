//! Task record wire types exchanged with the remote agent pipeline.
//!
//! This module defines [`TaskRecord`] and its parts: [`TaskId`],
//! [`TaskType`], [`TaskStatus`], [`TaskResult`], [`TriageDecision`] and
//! [`AiAnalysis`].
//!
//! # Serialization
//!
//! Field names are `snake_case` on the wire. `id` is accepted as either a
//! JSON string or number. Unknown task types are preserved as
//! [`TaskType::Other`] so newer pipeline steps do not break decoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Opaque identifier assigned to a task at creation.
///
/// # Examples
///
/// ```
/// use analysis_tasks::TaskId;
///
/// let from_number: TaskId = serde_json::from_str("42").unwrap();
/// let from_text: TaskId = serde_json::from_str("\"42\"").unwrap();
/// assert_eq!(from_number, from_text);
/// assert_eq!(from_number.as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// Kind of diagnostic step a task performs. Fixed at creation.
///
/// Known types are accepted in kebab or snake case and always serialize to
/// the kebab-case name from [`as_str`](Self::as_str), so a record received as
/// `initial_detail_fetch` is written back as `initial-detail-fetch`. Unknown
/// names are kept verbatim in [`Other`](Self::Other).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    /// First fetch of job details from the agent.
    InitialDetailFetch,
    /// Secondary collection of deeper logs, run when triage finds the
    /// initial data insufficient.
    DeepLogFetch,
    /// Any task type this crate does not know about.
    Other(String),
}

impl TaskType {
    /// Canonical wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InitialDetailFetch => "initial-detail-fetch",
            Self::DeepLogFetch => "deep-log-fetch",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for TaskType {
    fn from(name: String) -> Self {
        // The backend has used both kebab and snake spellings.
        match name.replace('_', "-").as_str() {
            "initial-detail-fetch" => Self::InitialDetailFetch,
            "deep-log-fetch" => Self::DeepLogFetch,
            _ => Self::Other(name),
        }
    }
}

impl From<TaskType> for String {
    fn from(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline status of a task.
///
/// ```text
/// Pending -> Processing -> Complete -> Finalized
///        \________________\_________\-> Failed
/// ```
///
/// `Finalized` and `Failed` are terminal: the record never changes again.
///
/// # Examples
///
/// ```
/// use analysis_tasks::TaskStatus;
///
/// assert!(!TaskStatus::Complete.is_terminal());
/// assert!(TaskStatus::Finalized.is_terminal());
/// assert!(TaskStatus::Failed.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued on the agent, not yet picked up.
    Pending,
    /// The agent is working on it.
    Processing,
    /// The step finished; triage may still be running on its result.
    Complete,
    /// Analysis is done and attached to the result (terminal).
    Finalized,
    /// The pipeline gave up (terminal).
    Failed,
}

impl TaskStatus {
    /// Returns `true` for `Finalized` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }

    fn allows_triage(&self) -> bool {
        !matches!(self, Self::Pending | Self::Processing)
    }

    fn allows_analysis(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Complete => write!(f, "complete"),
            Self::Finalized => write!(f, "finalized"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of the automated triage step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageDecision {
    /// Whether the initially collected data is enough for analysis.
    pub is_sufficient: bool,
}

/// AI-generated diagnosis attached to a finalized task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiAnalysis {
    /// Short description of what went wrong.
    pub problem_summary: String,
    /// Most likely root cause.
    pub probable_cause: String,
    /// What the administrator should do next.
    pub recommended_action: String,
}

/// Nested result, populated once the task reaches `complete`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Present once automated triage has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triage_decision: Option<TriageDecision>,

    /// Present only on finalized tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysis>,

    /// Fields this crate does not interpret, kept so the record round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record that breaks the data-model invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A triage decision appeared before the step completed.
    #[error("task {task_id} carries a triage decision while {status}")]
    TriageBeforeComplete {
        /// Offending task
        task_id: String,
        /// Status the record was in
        status: TaskStatus,
    },

    /// An AI analysis appeared before the task was finalized.
    #[error("task {task_id} carries an AI analysis while {status}")]
    AnalysisBeforeFinalized {
        /// Offending task
        task_id: String,
        /// Status the record was in
        status: TaskStatus,
    },

    /// A polled record has a different id than the one being tracked.
    #[error("expected task {expected}, received task {actual}")]
    IdChanged {
        /// Id being tracked
        expected: String,
        /// Id that came back
        actual: String,
    },

    /// A polled record changed its task type.
    #[error("task {task_id} changed type from {from} to {to}")]
    TaskTypeChanged {
        /// Task id
        task_id: String,
        /// Type fixed at creation
        from: String,
        /// Type that came back
        to: String,
    },
}

/// Server-held representation of one diagnostic workflow instance.
///
/// The engine never patches a record: each successful poll replaces the
/// cached copy wholesale.
///
/// # Examples
///
/// ```
/// use analysis_tasks::{TaskRecord, TaskStatus, TaskType};
///
/// let record: TaskRecord = serde_json::from_value(serde_json::json!({
///     "id": 7,
///     "task_type": "initial-detail-fetch",
///     "status": "pending"
/// }))
/// .unwrap();
///
/// assert_eq!(record.id.as_str(), "7");
/// assert_eq!(record.task_type, TaskType::InitialDetailFetch);
/// assert_eq!(record.status, TaskStatus::Pending);
/// assert!(record.result.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Identifier assigned at creation.
    pub id: TaskId,

    /// Diagnostic step requested.
    pub task_type: TaskType,

    /// Current pipeline status.
    pub status: TaskStatus,

    /// Nested result; `null` and absent both decode to `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl TaskRecord {
    /// Creates a record with no result.
    pub fn new(id: impl Into<TaskId>, task_type: TaskType, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            task_type,
            status,
            result: None,
        }
    }

    /// Attaches a result.
    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = Some(result);
        self
    }

    /// The triage decision, if triage has run.
    pub fn triage_decision(&self) -> Option<TriageDecision> {
        self.result.as_ref().and_then(|r| r.triage_decision)
    }

    /// The AI analysis, if the task is finalized.
    pub fn ai_analysis(&self) -> Option<&AiAnalysis> {
        self.result.as_ref().and_then(|r| r.ai_analysis.as_ref())
    }

    /// Checks the status-dependent invariants on `result`.
    ///
    /// A `failed` record may carry whatever the pipeline had produced before
    /// it failed.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.triage_decision().is_some() && !self.status.allows_triage() {
            return Err(RecordError::TriageBeforeComplete {
                task_id: self.id.to_string(),
                status: self.status,
            });
        }
        if self.ai_analysis().is_some() && !self.status.allows_analysis() {
            return Err(RecordError::AnalysisBeforeFinalized {
                task_id: self.id.to_string(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Checks that `self` can replace `previous`: same id, same task type.
    pub fn check_continuity(&self, previous: &TaskRecord) -> Result<(), RecordError> {
        if self.id != previous.id {
            return Err(RecordError::IdChanged {
                expected: previous.id.to_string(),
                actual: self.id.to_string(),
            });
        }
        if self.task_type != previous.task_type {
            return Err(RecordError::TaskTypeChanged {
                task_id: self.id.to_string(),
                from: previous.task_type.to_string(),
                to: self.task_type.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn status_wire_names() {
        for (status, name) in [
            (TaskStatus::Pending, "pending"),
            (TaskStatus::Processing, "processing"),
            (TaskStatus::Complete, "complete"),
            (TaskStatus::Finalized, "finalized"),
            (TaskStatus::Failed, "failed"),
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), json!(name));
            assert_eq!(status.to_string(), name);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result: Result<TaskStatus, _> = serde_json::from_value(json!("cancelled"));
        assert!(result.is_err());
    }

    #[test]
    fn task_type_accepts_both_spellings_and_keeps_unknown() {
        let kebab: TaskType = serde_json::from_value(json!("initial-detail-fetch")).unwrap();
        let snake: TaskType = serde_json::from_value(json!("initial_detail_fetch")).unwrap();
        assert_eq!(kebab, TaskType::InitialDetailFetch);
        assert_eq!(snake, TaskType::InitialDetailFetch);

        let other: TaskType = serde_json::from_value(json!("vm-snapshot-audit")).unwrap();
        assert_eq!(other, TaskType::Other("vm-snapshot-audit".to_string()));
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("vm-snapshot-audit"));
    }

    #[test]
    fn snake_case_known_type_serializes_as_kebab() {
        let snake: TaskType = serde_json::from_value(json!("deep_log_fetch")).unwrap();
        assert_eq!(serde_json::to_value(&snake).unwrap(), json!("deep-log-fetch"));
        assert_eq!(snake.to_string(), "deep-log-fetch");

        let other: TaskType = serde_json::from_value(json!("vm_snapshot_audit")).unwrap();
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("vm_snapshot_audit"));
    }

    #[test]
    fn decodes_finalized_record_with_analysis() {
        let record: TaskRecord = serde_json::from_value(json!({
            "id": "a1",
            "task_type": "deep-log-fetch",
            "status": "finalized",
            "result": {
                "triage_decision": { "is_sufficient": false },
                "ai_analysis": {
                    "problem_summary": "Snapshot quiesce timed out",
                    "probable_cause": "VSS writer stuck",
                    "recommended_action": "Restart the VSS service"
                },
                "log_bundle": "s3://bucket/logs.tgz"
            }
        }))
        .unwrap();

        assert_eq!(
            record.triage_decision(),
            Some(TriageDecision {
                is_sufficient: false
            })
        );
        assert_eq!(
            record.ai_analysis().map(|a| a.probable_cause.as_str()),
            Some("VSS writer stuck")
        );
        let extra = &record.result.as_ref().unwrap().extra;
        assert_eq!(extra.get("log_bundle"), Some(&json!("s3://bucket/logs.tgz")));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn null_result_decodes_as_none() {
        let record: TaskRecord = serde_json::from_value(json!({
            "id": 3,
            "task_type": "initial-detail-fetch",
            "status": "processing",
            "result": null
        }))
        .unwrap();
        assert!(record.result.is_none());
    }

    #[test]
    fn validate_rejects_early_triage_and_analysis() {
        let triage = TaskResult {
            triage_decision: Some(TriageDecision {
                is_sufficient: true,
            }),
            ..TaskResult::default()
        };
        let record = TaskRecord::new("t", TaskType::InitialDetailFetch, TaskStatus::Processing)
            .with_result(triage);
        assert!(matches!(
            record.validate(),
            Err(RecordError::TriageBeforeComplete { .. })
        ));

        let analysis = TaskResult {
            ai_analysis: Some(AiAnalysis::default()),
            ..TaskResult::default()
        };
        let record = TaskRecord::new("t", TaskType::InitialDetailFetch, TaskStatus::Complete)
            .with_result(analysis.clone());
        assert!(matches!(
            record.validate(),
            Err(RecordError::AnalysisBeforeFinalized { .. })
        ));

        let record = TaskRecord::new("t", TaskType::InitialDetailFetch, TaskStatus::Failed)
            .with_result(analysis);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn continuity_requires_same_id_and_type() {
        let base = TaskRecord::new("t1", TaskType::InitialDetailFetch, TaskStatus::Pending);

        let next = TaskRecord::new("t1", TaskType::InitialDetailFetch, TaskStatus::Complete);
        assert!(next.check_continuity(&base).is_ok());

        let other_id = TaskRecord::new("t2", TaskType::InitialDetailFetch, TaskStatus::Complete);
        assert!(matches!(
            other_id.check_continuity(&base),
            Err(RecordError::IdChanged { .. })
        ));

        let other_type = TaskRecord::new("t1", TaskType::DeepLogFetch, TaskStatus::Complete);
        assert!(matches!(
            other_type.check_continuity(&base),
            Err(RecordError::TaskTypeChanged { .. })
        ));
    }
}
