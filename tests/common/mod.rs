//! Shared fixtures: a scripted in-memory `TaskApi` and a recording observer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analysis_tasks::{
    AiAnalysis, ApiError, PollObserver, PollingError, TaskApi, TaskId, TaskRecord, TaskResult,
    TaskStatus, TaskType, TriageDecision,
};
use async_trait::async_trait;
use parking_lot::Mutex;

/// What one scripted call answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Record(TaskRecord),
    Fail(String),
    Status(u16),
}

impl Reply {
    fn into_result(self) -> Result<TaskRecord, ApiError> {
        match self {
            Reply::Record(record) => Ok(record),
            Reply::Fail(message) => Err(ApiError::transport(message)),
            Reply::Status(status) => Err(ApiError::Status {
                status,
                body: String::new(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct Step {
    delay: Duration,
    reply: Reply,
}

/// `TaskApi` that answers from per-operation queues.
///
/// Each call pops the next step, sleeps for its delay (tokio time, so paused
/// clocks apply) and returns its reply. A call with nothing scripted never
/// completes.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    creates: Mutex<VecDeque<Step>>,
    fetches: Mutex<VecDeque<Step>>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetched_ids: Mutex<Vec<TaskId>>,
    created_for: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_create(&self, reply: Reply) -> &Self {
        self.on_create_after(Duration::ZERO, reply)
    }

    pub fn on_create_after(&self, delay: Duration, reply: Reply) -> &Self {
        self.creates.lock().push_back(Step { delay, reply });
        self
    }

    pub fn on_fetch(&self, reply: Reply) -> &Self {
        self.on_fetch_after(Duration::ZERO, reply)
    }

    pub fn on_fetch_after(&self, delay: Duration, reply: Reply) -> &Self {
        self.fetches.lock().push_back(Step { delay, reply });
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetched_ids(&self) -> Vec<TaskId> {
        self.fetched_ids.lock().clone()
    }

    pub fn created_for(&self) -> Vec<String> {
        self.created_for.lock().clone()
    }

    async fn play(step: Option<Step>) -> Result<TaskRecord, ApiError> {
        match step {
            Some(step) => {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                step.reply.into_result()
            },
            None => futures::future::pending().await,
        }
    }
}

#[async_trait]
impl TaskApi for ScriptedApi {
    async fn create_analysis_task(&self, subject_id: &str) -> Result<TaskRecord, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created_for.lock().push(subject_id.to_string());
        let step = self.creates.lock().pop_front();
        Self::play(step).await
    }

    async fn fetch_task(&self, task_id: &TaskId) -> Result<TaskRecord, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_ids.lock().push(task_id.clone());
        let step = self.fetches.lock().pop_front();
        Self::play(step).await
    }
}

/// Everything a [`Recorder`] saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Record(TaskRecord),
    Error(PollingError),
    Cleared,
}

/// Observer that appends every callback to a shared log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Record(record) => Some(record.status),
                _ => None,
            })
            .collect()
    }
}

impl PollObserver for Recorder {
    fn on_record(&mut self, record: &TaskRecord) {
        self.events.lock().push(Event::Record(record.clone()));
    }

    fn on_transient_error(&mut self, error: &PollingError) {
        self.events.lock().push(Event::Error(error.clone()));
    }

    fn on_error_cleared(&mut self) {
        self.events.lock().push(Event::Cleared);
    }
}

pub const TASK: &str = "task-42";

pub fn initial(status: TaskStatus) -> TaskRecord {
    TaskRecord::new(TASK, TaskType::InitialDetailFetch, status)
}

pub fn complete(triage: Option<bool>) -> TaskRecord {
    initial(TaskStatus::Complete).with_result(TaskResult {
        triage_decision: triage.map(|is_sufficient| TriageDecision { is_sufficient }),
        ..TaskResult::default()
    })
}

pub fn finalized() -> TaskRecord {
    initial(TaskStatus::Finalized).with_result(TaskResult {
        triage_decision: Some(TriageDecision {
            is_sufficient: true,
        }),
        ai_analysis: Some(AiAnalysis {
            problem_summary: "Job 881 failed during snapshot".to_string(),
            probable_cause: "Datastore ran out of space".to_string(),
            recommended_action: "Free space on datastore DS-02 and rerun".to_string(),
        }),
        ..TaskResult::default()
    })
}

/// Advance the paused clock, letting spawned tasks run.
pub async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
