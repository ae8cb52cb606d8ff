//! Derivation of the user-facing status from a task record.
//!
//! The mapping is an ordered decision table expressed as [`Phase`]: each
//! variant is one row, and [`Phase::classify`] evaluates the rows top to
//! bottom, first match wins. [`derive`] is the pure entry point used by the
//! orchestrator.
//!
//! | Row | Condition | Status |
//! |-----|-----------|--------|
//! | [`Phase::NotCreated`] | no record yet | `initializing` |
//! | [`Phase::Finalized`] | `finalized` | `success` |
//! | [`Phase::Failed`] | `failed` | `error` |
//! | [`Phase::AwaitingInitialDetails`] | initial detail fetch, `pending`/`processing` | `loading` |
//! | [`Phase::Triaging`] | `complete`, no triage decision | `loading` |
//! | [`Phase::Finalizing`] | `complete`, triage sufficient | `loading` |
//! | [`Phase::CollectingDeeperLogs`] | `complete`, triage insufficient | `loading` |
//! | [`Phase::InProgress`] | anything else | `loading` |

use serde::Serialize;
use std::fmt;

use crate::types::{TaskRecord, TaskStatus, TaskType};

/// Coarse status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    /// No task exists yet.
    Initializing,
    /// The pipeline is still working.
    Loading,
    /// Analysis is available.
    Success,
    /// The pipeline failed; retrying the same task will not help.
    Error,
}

impl DisplayStatus {
    /// Returns `true` for `Success` and `Error`.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One row of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The creation call has not returned a record.
    NotCreated,
    /// Analysis finished.
    Finalized,
    /// The pipeline reported failure.
    Failed,
    /// Waiting for the agent to answer the initial detail request.
    AwaitingInitialDetails,
    /// Initial data arrived; automated triage has not decided yet.
    Triaging,
    /// Triage found the data sufficient; analysis is being finalized.
    Finalizing,
    /// Triage found the data insufficient. A deeper collection step runs
    /// as a separate task that this record does not expose.
    CollectingDeeperLogs,
    /// Fallback for states no other row covers.
    InProgress,
}

impl Phase {
    /// Evaluates the decision table.
    pub fn classify(task: Option<&TaskRecord>) -> Self {
        let Some(task) = task else {
            return Self::NotCreated;
        };

        match (task.status, &task.task_type, task.triage_decision()) {
            (TaskStatus::Finalized, _, _) => Self::Finalized,
            (TaskStatus::Failed, _, _) => Self::Failed,
            (TaskStatus::Pending | TaskStatus::Processing, TaskType::InitialDetailFetch, _) => {
                Self::AwaitingInitialDetails
            },
            (TaskStatus::Complete, _, None) => Self::Triaging,
            (TaskStatus::Complete, _, Some(decision)) if decision.is_sufficient => {
                Self::Finalizing
            },
            (TaskStatus::Complete, _, Some(_)) => Self::CollectingDeeperLogs,
            _ => Self::InProgress,
        }
    }

    /// Display status for this row.
    pub fn status(self) -> DisplayStatus {
        match self {
            Self::NotCreated => DisplayStatus::Initializing,
            Self::Finalized => DisplayStatus::Success,
            Self::Failed => DisplayStatus::Error,
            Self::AwaitingInitialDetails
            | Self::Triaging
            | Self::Finalizing
            | Self::CollectingDeeperLogs
            | Self::InProgress => DisplayStatus::Loading,
        }
    }

    /// Message shown alongside the status.
    pub fn message(self) -> &'static str {
        match self {
            Self::NotCreated => "Preparing the analysis task...",
            Self::Finalized => "Analysis complete.",
            Self::Failed => "The analysis failed. Start a new analysis to try again.",
            Self::AwaitingInitialDetails => "Requesting initial job details from the agent...",
            Self::Triaging => "Job details received. Running automated triage...",
            Self::Finalizing => "Triage found enough data. Finalizing the analysis...",
            Self::CollectingDeeperLogs => {
                "Triage needs more data. Collecting deeper logs from the agent; this can take several minutes..."
            },
            Self::InProgress => "Analysis in progress...",
        }
    }
}

/// Status and message derived from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedState {
    /// Coarse status.
    pub status: DisplayStatus,
    /// Human-readable message.
    pub message: &'static str,
    /// Decision-table row that produced this state.
    pub phase: Phase,
}

impl From<Phase> for DerivedState {
    fn from(phase: Phase) -> Self {
        Self {
            status: phase.status(),
            message: phase.message(),
            phase,
        }
    }
}

impl Default for DerivedState {
    fn default() -> Self {
        Phase::NotCreated.into()
    }
}

/// Maps a record, or its absence, to the user-facing state.
///
/// Pure and deterministic.
///
/// # Examples
///
/// ```
/// use analysis_tasks::state::{derive, DisplayStatus};
/// use analysis_tasks::{TaskRecord, TaskStatus, TaskType};
///
/// assert_eq!(derive(None).status, DisplayStatus::Initializing);
///
/// let record = TaskRecord::new("1", TaskType::InitialDetailFetch, TaskStatus::Finalized);
/// assert_eq!(derive(Some(&record)).status, DisplayStatus::Success);
/// ```
pub fn derive(task: Option<&TaskRecord>) -> DerivedState {
    Phase::classify(task).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AiAnalysis, TaskResult, TriageDecision};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn record(task_type: TaskType, status: TaskStatus, triage: Option<bool>) -> TaskRecord {
        let mut record = TaskRecord::new("task-1", task_type, status);
        if let Some(is_sufficient) = triage {
            record = record.with_result(TaskResult {
                triage_decision: Some(TriageDecision { is_sufficient }),
                ..TaskResult::default()
            });
        }
        record
    }

    #[test]
    fn absent_record_is_initializing() {
        let state = derive(None);
        assert_eq!(state.status, DisplayStatus::Initializing);
        assert_eq!(state.phase, Phase::NotCreated);
        assert_eq!(state, DerivedState::default());
    }

    #[test]
    fn pending_initial_fetch_requests_details() {
        let state = derive(Some(&record(
            TaskType::InitialDetailFetch,
            TaskStatus::Pending,
            None,
        )));
        assert_eq!(state.status, DisplayStatus::Loading);
        assert_eq!(state.phase, Phase::AwaitingInitialDetails);
        assert!(state.message.contains("initial job details"));
    }

    #[test]
    fn complete_without_triage_is_triaging() {
        let state = derive(Some(
            &record(TaskType::InitialDetailFetch, TaskStatus::Complete, None)
                .with_result(TaskResult::default()),
        ));
        assert_eq!(state.status, DisplayStatus::Loading);
        assert_eq!(state.phase, Phase::Triaging);
        assert!(state.message.contains("triage"));
    }

    #[test]
    fn sufficient_triage_is_finalizing() {
        let state = derive(Some(&record(
            TaskType::InitialDetailFetch,
            TaskStatus::Complete,
            Some(true),
        )));
        assert_eq!(state.phase, Phase::Finalizing);
        assert_eq!(state.status, DisplayStatus::Loading);
    }

    #[test]
    fn insufficient_triage_is_collecting_deeper_logs() {
        let state = derive(Some(&record(
            TaskType::InitialDetailFetch,
            TaskStatus::Complete,
            Some(false),
        )));
        assert_eq!(state.phase, Phase::CollectingDeeperLogs);
        assert_eq!(state.status, DisplayStatus::Loading);
        assert!(state.message.contains("deeper logs"));
    }

    #[test]
    fn finalized_with_analysis_is_success() {
        let finalized = record(TaskType::DeepLogFetch, TaskStatus::Finalized, Some(false))
            .with_result(TaskResult {
                ai_analysis: Some(AiAnalysis {
                    problem_summary: "Job 881 failed".to_string(),
                    probable_cause: "Media agent offline".to_string(),
                    recommended_action: "Bring the media agent back online".to_string(),
                }),
                ..TaskResult::default()
            });
        let state = derive(Some(&finalized));
        assert_eq!(state.status, DisplayStatus::Success);
        assert!(state.status.is_final());
    }

    #[test]
    fn processing_deep_fetch_falls_through_to_generic_row() {
        let state = derive(Some(&record(
            TaskType::DeepLogFetch,
            TaskStatus::Processing,
            None,
        )));
        assert_eq!(state.phase, Phase::InProgress);
        assert_eq!(state.status, DisplayStatus::Loading);
    }

    #[test]
    fn unknown_task_type_pending_is_generic() {
        let state = derive(Some(&record(
            TaskType::Other("future-step".to_string()),
            TaskStatus::Pending,
            None,
        )));
        assert_eq!(state.phase, Phase::InProgress);
    }

    fn any_task_type() -> impl Strategy<Value = TaskType> {
        prop_oneof![
            Just(TaskType::InitialDetailFetch),
            Just(TaskType::DeepLogFetch),
            "[a-z]{1,12}".prop_map(TaskType::Other),
        ]
    }

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Processing),
            Just(TaskStatus::Complete),
            Just(TaskStatus::Finalized),
            Just(TaskStatus::Failed),
        ]
    }

    fn any_record() -> impl Strategy<Value = TaskRecord> {
        (
            any_task_type(),
            any_status(),
            proptest::option::of(any::<bool>()),
            any::<bool>(),
        )
            .prop_map(|(task_type, status, triage, with_analysis)| {
                let mut record = record(task_type, status, triage);
                if with_analysis {
                    let mut result = record.result.take().unwrap_or_default();
                    result.ai_analysis = Some(AiAnalysis::default());
                    record.result = Some(result);
                }
                record
            })
    }

    proptest! {
        #[test]
        fn finalized_is_always_success(mut record in any_record()) {
            record.status = TaskStatus::Finalized;
            prop_assert_eq!(derive(Some(&record)).status, DisplayStatus::Success);
        }

        #[test]
        fn failed_is_always_error(mut record in any_record()) {
            record.status = TaskStatus::Failed;
            prop_assert_eq!(derive(Some(&record)).status, DisplayStatus::Error);
        }

        #[test]
        fn derive_is_idempotent(record in any_record()) {
            prop_assert_eq!(derive(Some(&record)), derive(Some(&record)));
        }

        #[test]
        fn non_terminal_records_are_loading(record in any_record()) {
            prop_assume!(!record.status.is_terminal());
            prop_assert_eq!(derive(Some(&record)).status, DisplayStatus::Loading);
        }
    }
}
