//! Workflow owner: creates the task, runs the poll schedule and publishes
//! the derived state.
//!
//! A [`TaskOrchestrator`] drives one workflow at a time. Every call to
//! [`start`](TaskOrchestrator::start) or [`stop`](TaskOrchestrator::stop)
//! begins a new *generation*; updates produced by an older generation (a
//! creation call that returns late, a poll response racing a stop) are
//! dropped instead of applied.
//!
//! The presentation layer reads state either by calling
//! [`snapshot`](TaskOrchestrator::snapshot) or by awaiting changes on the
//! receiver returned from [`subscribe`](TaskOrchestrator::subscribe).

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::client::TaskApi;
use crate::error::{Error, Result};
use crate::poll::{PollConfig, PollHandle, PollObserver, PollScheduler, PollingError};
use crate::state::{self, DerivedState};
use crate::types::{TaskId, TaskRecord};

/// Everything the presentation layer needs, published as one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    /// Subject of the current workflow, `None` when idle.
    pub subject_id: Option<String>,
    /// Task created for the subject.
    pub task_id: Option<TaskId>,
    /// Derived from `record`.
    pub state: DerivedState,
    /// Last failed poll, cleared by the next successful one.
    pub polling_error: Option<PollingError>,
    /// Set when the creation call failed. The workflow did not start.
    pub initialization_error: Option<String>,
    /// Most recently applied record.
    pub record: Option<TaskRecord>,
}

impl WorkflowSnapshot {
    fn for_subject(subject_id: Option<String>) -> Self {
        Self {
            subject_id,
            ..Self::default()
        }
    }

    fn apply_record(&mut self, record: &TaskRecord) {
        self.task_id = Some(record.id.clone());
        self.state = state::derive(Some(record));
        self.record = Some(record.clone());
    }
}

/// State shared with the observers of running schedules.
#[derive(Debug)]
struct Shared {
    generation: AtomicU64,
    snapshot: watch::Sender<WorkflowSnapshot>,
}

impl Shared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Mutates the snapshot only if `generation` is still current.
    fn update(
        &self,
        generation: u64,
        modify: impl FnOnce(&mut WorkflowSnapshot) -> bool,
    ) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            if self.generation() != generation {
                return false;
            }
            modify(snapshot)
        })
    }
}

/// Routes scheduler callbacks into the snapshot of one generation.
struct SnapshotObserver {
    generation: u64,
    shared: Arc<Shared>,
}

impl PollObserver for SnapshotObserver {
    fn on_record(&mut self, record: &TaskRecord) {
        let applied = self.shared.update(self.generation, |snapshot| {
            snapshot.apply_record(record);
            true
        });
        if applied {
            debug!(task_id = %record.id, status = %record.status, "Published task record");
        }
    }

    fn on_transient_error(&mut self, error: &PollingError) {
        self.shared.update(self.generation, |snapshot| {
            snapshot.polling_error = Some(error.clone());
            true
        });
    }

    fn on_error_cleared(&mut self) {
        self.shared.update(self.generation, |snapshot| {
            snapshot.polling_error.take().is_some()
        });
    }
}

/// Creates analysis tasks and tracks them to completion.
///
/// # Example
///
/// ```rust,ignore
/// use analysis_tasks::{HttpTaskApi, ApiConfig, PollConfig, TaskOrchestrator};
/// use std::sync::Arc;
///
/// let api = Arc::new(HttpTaskApi::new(ApiConfig::default())?);
/// let orchestrator = TaskOrchestrator::new(api, PollConfig::default())?;
///
/// let mut updates = orchestrator.subscribe();
/// orchestrator.start("4711").await?;
///
/// while updates.changed().await.is_ok() {
///     let snapshot = updates.borrow_and_update().clone();
///     println!("{}: {}", snapshot.state.status, snapshot.state.message);
///     if snapshot.state.status.is_final() {
///         break;
///     }
/// }
/// orchestrator.stop();
/// ```
pub struct TaskOrchestrator<A: ?Sized> {
    api: Arc<A>,
    scheduler: PollScheduler<A>,
    shared: Arc<Shared>,
    active: Mutex<Option<PollHandle>>,
}

impl<A: ?Sized> std::fmt::Debug for TaskOrchestrator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOrchestrator")
            .field("scheduler", &self.scheduler)
            .field("generation", &self.shared.generation())
            .field("polling", &self.active.lock().is_some())
            .finish()
    }
}

impl<A: TaskApi + ?Sized + 'static> TaskOrchestrator<A> {
    /// Create an idle orchestrator.
    pub fn new(api: Arc<A>, config: PollConfig) -> Result<Self> {
        let scheduler = PollScheduler::new(Arc::clone(&api), config)?;
        let (snapshot, _) = watch::channel(WorkflowSnapshot::default());
        Ok(Self {
            api,
            scheduler,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                snapshot,
            }),
            active: Mutex::new(None),
        })
    }

    /// Start a workflow for `subject_id`, replacing any running one.
    ///
    /// Issues exactly one creation call. On success the returned record is
    /// published and, unless it is already terminal, polling begins. On
    /// failure nothing is polled and [`Error::Initialization`] is returned;
    /// the call is not retried.
    ///
    /// Returns [`Error::Superseded`] if [`stop`](Self::stop) or another
    /// `start` ran while the creation call was in flight.
    pub async fn start(&self, subject_id: impl Into<String>) -> Result<TaskRecord> {
        let subject_id = subject_id.into();
        let generation = self.reset(Some(subject_id.clone()));
        info!(subject_id = %subject_id, generation, "Starting analysis workflow");

        let created = self.api.create_analysis_task(&subject_id).await;

        if self.shared.generation() != generation {
            debug!(
                subject_id = %subject_id,
                "Creation result arrived after the workflow was replaced"
            );
            return Err(Error::Superseded { subject_id });
        }

        let record = match created {
            Ok(record) => record,
            Err(source) => {
                error!(subject_id = %subject_id, error = %source, "Failed to create analysis task");
                let message = source.to_string();
                self.shared.update(generation, |snapshot| {
                    snapshot.initialization_error = Some(message);
                    true
                });
                return Err(Error::Initialization { subject_id, source });
            },
        };

        info!(
            subject_id = %subject_id,
            task_id = %record.id,
            status = %record.status,
            "Analysis task created"
        );
        self.shared.update(generation, |snapshot| {
            snapshot.apply_record(&record);
            true
        });

        if record.status.is_terminal() {
            info!(
                task_id = %record.id,
                status = %record.status,
                "Task already terminal, not polling"
            );
            return Ok(record);
        }

        let handle = self.scheduler.begin(
            record.clone(),
            SnapshotObserver {
                generation,
                shared: Arc::clone(&self.shared),
            },
        );

        let mut active = self.active.lock();
        if self.shared.generation() != generation {
            // Replaced between the check above and now.
            handle.end();
            return Err(Error::Superseded { subject_id });
        }
        *active = Some(handle);
        Ok(record)
    }

    /// Cancel the running workflow, if any, and return to the idle state.
    /// Idempotent.
    pub fn stop(&self) {
        let had_subject = self.shared.snapshot.borrow().subject_id.is_some();
        self.reset(None);
        if had_subject {
            info!("Analysis workflow stopped");
        }
    }

    /// Current derived state.
    pub fn current_state(&self) -> DerivedState {
        self.shared.snapshot.borrow().state
    }

    /// Last transient polling error, if not yet cleared.
    pub fn polling_error(&self) -> Option<PollingError> {
        self.shared.snapshot.borrow().polling_error.clone()
    }

    /// Dismiss the transient polling error. Polling is unaffected.
    pub fn clear_polling_error(&self) {
        self.shared
            .snapshot
            .send_if_modified(|snapshot| snapshot.polling_error.take().is_some());
    }

    /// Copy of everything published so far.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Returns `true` while a poll schedule is running.
    pub fn is_polling(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_ended())
    }

    /// Ends the active schedule, advances the generation and publishes a
    /// fresh snapshot. Returns the new generation.
    fn reset(&self, subject_id: Option<String>) -> u64 {
        let mut active = self.active.lock();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = active.take() {
            debug!(task_id = %handle.task_id(), "Ending previous poll schedule");
            handle.end();
        }
        self.shared
            .snapshot
            .send_replace(WorkflowSnapshot::for_subject(subject_id));
        generation
    }
}

#[cfg(feature = "http-client")]
impl TaskOrchestrator<crate::client::HttpTaskApi> {
    /// Build an orchestrator backed by [`HttpTaskApi`](crate::client::HttpTaskApi).
    pub fn from_config(config: &crate::config::EngineConfig) -> Result<Self> {
        config.validate()?;
        let api = crate::client::HttpTaskApi::new(config.api.clone())?;
        Self::new(Arc::new(api), config.poll.clone())
    }
}

impl<A: ?Sized> Drop for TaskOrchestrator<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.active.get_mut().take() {
            handle.end();
        }
    }
}
