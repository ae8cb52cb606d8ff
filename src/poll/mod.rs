//! Recurring fetch of a task record.
//!
//! [`PollScheduler::begin`] spawns one polling task per workflow and returns
//! a [`PollHandle`]. The polling task:
//!
//! - ticks at a fixed rate ([`PollConfig::interval_ms`]), independent of how
//!   long each fetch takes;
//! - tags every fetch with a sequence number and applies a response only if
//!   nothing newer has been applied ([`SequenceGate`]);
//! - hands each applied record to a [`PollObserver`] and reports failed
//!   fetches as [`PollingError`] without stopping;
//! - stops by itself once the cached record is terminal.
//!
//! Ending the handle (or dropping it) cancels the pending tick and drops any
//! fetch still in flight, so a late response can never reach the observer.
//!
//! # Example
//!
//! ```rust,ignore
//! use analysis_tasks::poll::{PollCallbacks, PollConfig, PollScheduler};
//!
//! let scheduler = PollScheduler::new(api, PollConfig::default())?;
//! let handle = scheduler.begin(
//!     created_record,
//!     PollCallbacks::new(
//!         |record| println!("status: {}", record.status),
//!         |error| eprintln!("{error}"),
//!     ),
//! );
//! // ... later, on subject change:
//! handle.end();
//! ```

mod config;
mod error;
mod sequence;

pub use config::{OverlapPolicy, PollConfig};
pub use error::{PollingError, CONNECTION_LOST_MESSAGE};
pub use sequence::SequenceGate;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::TaskApi;
use crate::error::{ApiError, Result};
use crate::types::{TaskId, TaskRecord, TaskStatus};

/// Receives the results of a poll schedule.
///
/// Callbacks run on the polling task, one at a time, in the order responses
/// are applied.
pub trait PollObserver: Send + 'static {
    /// A fetched record replaced the cached one.
    fn on_record(&mut self, record: &TaskRecord);

    /// A fetch failed. Polling continues on the next tick.
    fn on_transient_error(&mut self, error: &PollingError);

    /// A fetch succeeded after one or more failures. Called before
    /// [`on_record`](Self::on_record).
    fn on_error_cleared(&mut self) {}
}

/// Closure-based [`PollObserver`].
pub struct PollCallbacks<R, E> {
    on_record: R,
    on_transient_error: E,
}

impl<R, E> PollCallbacks<R, E>
where
    R: FnMut(&TaskRecord) + Send + 'static,
    E: FnMut(&PollingError) + Send + 'static,
{
    /// Wrap a record callback and an error callback.
    pub fn new(on_record: R, on_transient_error: E) -> Self {
        Self {
            on_record,
            on_transient_error,
        }
    }
}

impl<R, E> PollObserver for PollCallbacks<R, E>
where
    R: FnMut(&TaskRecord) + Send + 'static,
    E: FnMut(&PollingError) + Send + 'static,
{
    fn on_record(&mut self, record: &TaskRecord) {
        (self.on_record)(record);
    }

    fn on_transient_error(&mut self, error: &PollingError) {
        (self.on_transient_error)(error);
    }
}

/// How a poll schedule ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The record reached a terminal status.
    Terminal(TaskStatus),
    /// The handle was ended or dropped first.
    Cancelled,
    /// The polling task panicked.
    Aborted,
}

/// Starts poll schedules against a [`TaskApi`].
pub struct PollScheduler<A: ?Sized> {
    api: Arc<A>,
    config: PollConfig,
}

impl<A: ?Sized> Clone for PollScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            config: self.config.clone(),
        }
    }
}

impl<A: ?Sized> std::fmt::Debug for PollScheduler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("config", &self.config)
            .finish()
    }
}

impl<A: TaskApi + ?Sized + 'static> PollScheduler<A> {
    /// Create a scheduler. Fails if the interval is zero.
    pub fn new(api: Arc<A>, config: PollConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { api, config })
    }

    /// Scheduler settings.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Start polling the task described by `initial`.
    ///
    /// `initial` seeds the cache (normally the record returned by the
    /// creation call) and is not reported to the observer. The first fetch
    /// happens one interval after this call. If `initial` is already
    /// terminal, nothing is fetched.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn begin<O: PollObserver>(&self, initial: TaskRecord, observer: O) -> PollHandle {
        let cancel = CancellationToken::new();
        let task_id = initial.id.clone();

        let poller = Poller {
            api: Arc::clone(&self.api),
            config: self.config.clone(),
            cached: initial,
            observer,
            cancel: cancel.clone(),
            gate: SequenceGate::new(),
            consecutive_failures: 0,
            error_reported: false,
        };

        PollHandle {
            task_id,
            cancel,
            task: Some(tokio::spawn(poller.run())),
        }
    }
}

/// Disposable handle to a running poll schedule.
///
/// Dropping the handle ends the schedule.
#[derive(Debug)]
pub struct PollHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollHandle {
    /// Task being polled.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Stop polling now. Idempotent.
    pub fn end(&self) {
        if !self.cancel.is_cancelled() {
            debug!(task_id = %self.task_id, "Ending poll schedule");
            self.cancel.cancel();
        }
    }

    /// Returns `true` once the schedule was ended or finished on its own.
    pub fn is_ended(&self) -> bool {
        self.cancel.is_cancelled() || self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the schedule to finish.
    ///
    /// Does not end the schedule. Call [`end`](Self::end) first to stop a
    /// task that may never turn terminal.
    pub async fn join(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Polling task did not complete");
                PollOutcome::Aborted
            },
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type FetchFuture = BoxFuture<'static, (u64, std::result::Result<TaskRecord, ApiError>)>;

/// State owned by one polling task. `cached` has no other writer.
struct Poller<A: ?Sized, O> {
    api: Arc<A>,
    config: PollConfig,
    cached: TaskRecord,
    observer: O,
    cancel: CancellationToken,
    gate: SequenceGate,
    consecutive_failures: u32,
    error_reported: bool,
}

impl<A: TaskApi + ?Sized + 'static, O: PollObserver> Poller<A, O> {
    async fn run(mut self) -> PollOutcome {
        let task_id = self.cached.id.clone();
        if self.cached.status.is_terminal() {
            debug!(
                task_id = %task_id,
                status = %self.cached.status,
                "Task already terminal, not polling"
            );
            return PollOutcome::Terminal(self.cached.status);
        }

        let period = self.config.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: FuturesUnordered<FetchFuture> = FuturesUnordered::new();

        info!(
            task_id = %task_id,
            interval_ms = self.config.interval_ms,
            overlap = %self.config.overlap,
            "Polling started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!(task_id = %task_id, dropped = in_flight.len(), "Polling cancelled");
                    return PollOutcome::Cancelled;
                }

                Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.apply(seq, result);
                }

                _ = ticker.tick() => {
                    if self.config.overlap == OverlapPolicy::SingleFlight && !in_flight.is_empty() {
                        debug!(task_id = %task_id, "Previous fetch still in flight, skipping tick");
                        continue;
                    }
                    let seq = self.gate.issue();
                    let api = Arc::clone(&self.api);
                    let id = task_id.clone();
                    debug!(task_id = %task_id, seq, "Issuing poll");
                    in_flight.push(async move { (seq, api.fetch_task(&id).await) }.boxed());
                }
            }

            if self.cached.status.is_terminal() {
                info!(
                    task_id = %task_id,
                    status = %self.cached.status,
                    "Task reached terminal status, polling stopped"
                );
                return PollOutcome::Terminal(self.cached.status);
            }
        }
    }

    /// Applies one response: the only path that writes `cached`.
    fn apply(&mut self, seq: u64, result: std::result::Result<TaskRecord, ApiError>) {
        if self.gate.is_superseded(seq) {
            debug!(
                task_id = %self.cached.id,
                seq,
                last_applied = self.gate.last_applied(),
                "Discarding stale response"
            );
            return;
        }

        let record = match result.and_then(|record| {
            record.check_continuity(&self.cached)?;
            Ok(record)
        }) {
            Ok(record) => record,
            Err(err) => {
                self.report_failure(seq, &err);
                return;
            },
        };

        self.gate.accept(seq);
        self.cached = record;
        self.consecutive_failures = 0;
        if std::mem::take(&mut self.error_reported) {
            debug!(task_id = %self.cached.id, "Polling recovered");
            self.observer.on_error_cleared();
        }
        debug!(task_id = %self.cached.id, seq, status = %self.cached.status, "Applied task record");
        self.observer.on_record(&self.cached);
    }

    fn report_failure(&mut self, seq: u64, err: &ApiError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.error_reported = true;
        warn!(
            task_id = %self.cached.id,
            seq,
            consecutive_failures = self.consecutive_failures,
            error = %err,
            "Poll failed, retrying on next tick"
        );
        let error = PollingError::new(self.cached.id.clone(), err, self.consecutive_failures);
        self.observer.on_transient_error(&error);
    }
}
