//! Check execution.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tokio::{
    select,
    sync::mpsc,
    task::{self, JoinError, JoinSet},
    time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::{
    check::CheckId,
    outcome::{FailureKind, RunOutcome},
    scheduler::WorkItem,
    shutdown::ShutdownHandle,
    sink::OutcomeSink,
    telemetry::{self, DropReason},
};

mod execute;
use self::execute::execute;

/// Default maximum duration of a single check run.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period given to in-flight check runs during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runner configuration.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Maximum number of checks running at the same time.
    pub workers: usize,

    /// Maximum duration of a single check run.
    pub check_timeout: Duration,

    /// How long in-flight check runs are given to finish during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Check runs currently executing, keyed by both task and check identity.
#[derive(Default)]
struct InFlight {
    checks: HashSet<CheckId>,
    tasks: HashMap<task::Id, CheckId>,
    executions: JoinSet<RunOutcome>,
}

impl InFlight {
    fn len(&self) -> usize {
        self.executions.len()
    }

    fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    /// Starts running `item`, unless a run of the same check is already in flight.
    fn start(&mut self, item: WorkItem, check_timeout: Duration) -> bool {
        if !self.checks.insert(item.id.clone()) {
            return false;
        }

        let handle = self.executions.spawn(execute(item.check, item.id.clone(), check_timeout));
        self.tasks.insert(handle.id(), item.id);
        true
    }

    /// Waits for the next run to finish, releasing its check identity whether or not the task completed.
    async fn join_next(&mut self) -> Option<(CheckId, Result<RunOutcome, JoinError>)> {
        let (task_id, result) = match self.executions.join_next_with_id().await? {
            Ok((task_id, outcome)) => (task_id, Ok(outcome)),
            Err(e) => (e.id(), Err(e)),
        };

        let id = self.tasks.remove(&task_id)?;
        self.checks.remove(&id);
        Some((id, result))
    }
}

/// Executes due checks taken from the work queue.
///
/// Up to `workers` checks run concurrently, each as its own task. A check never runs twice at the same time: a work item
/// for a check that is still running is dropped. Errors, panics, and timeouts are turned into failure outcomes, and every
/// outcome is handed to the sink.
pub struct Runner {
    work_rx: mpsc::Receiver<WorkItem>,
    sink: Arc<dyn OutcomeSink>,
    config: RunnerConfig,
}

impl Runner {
    /// Creates a new `Runner` consuming the given work queue.
    pub fn new(work_rx: mpsc::Receiver<WorkItem>, sink: Arc<dyn OutcomeSink>, config: RunnerConfig) -> Self {
        Self { work_rx, sink, config }
    }

    /// Runs checks from the work queue until shutdown is signalled or the work queue is closed.
    ///
    /// On shutdown, queued work items are abandoned and in-flight runs are given the configured shutdown timeout to
    /// finish before being aborted.
    pub async fn run(mut self, mut shutdown: ShutdownHandle) {
        let workers = self.config.workers.max(1);
        let mut in_flight = InFlight::default();

        info!(
            workers,
            check_timeout_secs = self.config.check_timeout.as_secs_f64(),
            "Runner started."
        );

        loop {
            let has_capacity = in_flight.len() < workers;

            select! {
                biased;

                _ = &mut shutdown => {
                    info!("Runner stopping.");
                    break;
                }

                Some((id, result)) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.complete(id, result);
                }

                maybe_item = self.work_rx.recv(), if has_capacity => match maybe_item {
                    Some(item) => self.dispatch(item, &mut in_flight),
                    None => {
                        info!("Work queue closed. Runner stopping.");
                        break;
                    }
                },
            }
        }

        self.abandon_queued();
        self.drain(&mut in_flight).await;

        info!("Runner stopped.");
    }

    fn dispatch(&self, item: WorkItem, in_flight: &mut InFlight) {
        let id = item.id.clone();
        let lateness_ms = item.due.elapsed().as_millis() as u64;
        if !in_flight.start(item, self.config.check_timeout) {
            warn!(check.id = %id, "Check is already running. Dropping check run.");
            telemetry::checks_dropped(DropReason::AlreadyRunning, 1);
            return;
        }

        debug!(check.id = %id, lateness_ms, "Running check.");
    }

    fn complete(&self, id: CheckId, result: Result<RunOutcome, JoinError>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                debug!(check.id = %id, "Check run was aborted.");
                return;
            }
            Err(e) => {
                error!(check.id = %id, error = %e, "Check run task failed.");
                return;
            }
        };

        if let Some(failure) = outcome.failure() {
            let check = &outcome.description;
            match failure.kind {
                FailureKind::Error => warn!(check.id = %id, %check, error = %failure.detail, "Check run failed."),
                FailureKind::Panic => error!(check.id = %id, %check, panic = %failure.detail, "Check run panicked."),
                FailureKind::TimedOut => {
                    error!(check.id = %id, %check, timeout = ?self.config.check_timeout, "Check run timed out.")
                }
            }
        }

        self.sink.report(outcome);
    }

    fn abandon_queued(&mut self) {
        self.work_rx.close();

        let mut abandoned = 0;
        while self.work_rx.try_recv().is_ok() {
            abandoned += 1;
        }

        if abandoned > 0 {
            info!(abandoned, "Abandoned queued check runs.");
            telemetry::checks_dropped(DropReason::Abandoned, abandoned);
        }
    }

    async fn drain(&self, in_flight: &mut InFlight) {
        if in_flight.is_empty() {
            return;
        }

        info!(in_flight = in_flight.len(), "Waiting for in-flight check runs to finish.");

        let wait_for_all = async {
            while let Some((id, result)) = in_flight.join_next().await {
                self.complete(id, result);
            }
        };

        if timeout(self.config.shutdown_timeout, wait_for_all).await.is_err() {
            warn!(
                remaining = in_flight.len(),
                "In-flight check runs did not finish in time. Aborting."
            );
            in_flight.executions.shutdown().await;
        }
    }
}
