//! Check scheduling.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use tokio::{
    select,
    sync::mpsc::{self, error::TrySendError},
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    check::{Check, CheckId},
    config::{DEFAULT_CHECK_INTERVAL, MAX_CHECK_INTERVAL},
    shutdown::ShutdownHandle,
    telemetry::{self, DropReason},
};

/// Default interval between scheduler ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A due occurrence of a check, waiting to be run.
pub struct WorkItem {
    /// The check to run.
    pub check: Arc<dyn Check>,

    /// Identity of the check, as registered.
    pub id: CheckId,

    /// When this occurrence was due.
    pub due: Instant,
}

impl WorkItem {
    /// Creates a new `WorkItem` for the given check, due at `due`.
    pub fn new(check: Arc<dyn Check>, due: Instant) -> Self {
        let id = check.id().clone();
        Self { check, id, due }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("due", &self.due)
            .finish()
    }
}

/// Creates the bounded work queue connecting the scheduler to the runner.
///
/// A capacity of zero is raised to one.
pub fn work_queue(capacity: usize) -> (mpsc::Sender<WorkItem>, mpsc::Receiver<WorkItem>) {
    mpsc::channel(capacity.max(1))
}

struct ScheduledCheck {
    check: Arc<dyn Check>,
    interval: Duration,
    next_due: Instant,
}

/// What happened during a single scheduler tick.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TickSummary {
    /// Number of checks that were due.
    pub due: usize,

    /// Number of due checks placed on the work queue.
    pub enqueued: usize,

    /// Number of due checks dropped because the work queue was full.
    pub dropped: usize,

    /// Whether the work queue was found closed.
    pub queue_closed: bool,
}

/// Decides when each registered check is due and hands it to the runner.
///
/// Each registered check is due at its registration instant and then at every multiple of its interval after that.
/// On every tick, due checks are placed on the work queue without waiting: if the queue is full, the occurrence is
/// dropped and the check is next due one interval later. A check is enqueued at most once per tick, so a scheduler
/// that fell behind works through the missed occurrences one tick at a time.
///
/// Checks must be registered before [`run`][Self::run] is called, which consumes the scheduler.
pub struct Scheduler {
    registry: HashMap<CheckId, ScheduledCheck>,
    work_tx: mpsc::Sender<WorkItem>,
    tick_interval: Duration,
}

impl Scheduler {
    /// Creates a new `Scheduler` that places due checks on the given work queue.
    pub fn new(work_tx: mpsc::Sender<WorkItem>) -> Self {
        Self {
            registry: HashMap::new(),
            work_tx,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Sets the interval between ticks.
    ///
    /// A zero interval is ignored.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        if tick_interval.is_zero() {
            warn!("Scheduler tick interval cannot be zero. Keeping {:?}.", self.tick_interval);
        } else {
            self.tick_interval = tick_interval;
        }
        self
    }

    /// Registers a check, due immediately.
    ///
    /// If a check with the same identity is already registered, it is replaced and returned.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Option<Arc<dyn Check>> {
        self.register_at(check, Instant::now())
    }

    /// Registers a check, due at `now`.
    ///
    /// A zero interval is replaced by [`DEFAULT_CHECK_INTERVAL`], and an interval above [`MAX_CHECK_INTERVAL`] is
    /// capped. If a check with the same identity is already registered, it is replaced and returned.
    pub fn register_at(&mut self, check: Arc<dyn Check>, now: Instant) -> Option<Arc<dyn Check>> {
        let id = check.id().clone();
        let mut interval = check.interval();
        if interval.is_zero() {
            warn!(check.id = %id, "Check interval cannot be zero. Using default interval.");
            interval = DEFAULT_CHECK_INTERVAL;
        } else if interval > MAX_CHECK_INTERVAL {
            warn!(
                check.id = %id,
                interval_secs = interval.as_secs(),
                max_secs = MAX_CHECK_INTERVAL.as_secs(),
                "Check interval is too long. Using maximum interval."
            );
            interval = MAX_CHECK_INTERVAL;
        }

        debug!(check.id = %id, check.interval_secs = interval.as_secs_f64(), "Scheduling check.");
        telemetry::checks_registered();

        let entry = ScheduledCheck {
            check,
            interval,
            next_due: now,
        };
        let replaced = self.registry.insert(id.clone(), entry).map(|previous| previous.check);
        if replaced.is_some() {
            info!(check.id = %id, "Check was already scheduled. Replacing previous registration.");
        }
        replaced
    }

    /// Returns the number of registered checks.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` if no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Returns `true` if a check with the given identity is registered.
    pub fn is_scheduled(&self, id: &CheckId) -> bool {
        self.registry.contains_key(id)
    }

    /// Returns when the check with the given identity is next due.
    pub fn next_due(&self, id: &CheckId) -> Option<Instant> {
        self.registry.get(id).map(|entry| entry.next_due)
    }

    /// Returns the check registered under the given identity.
    pub fn check(&self, id: &CheckId) -> Option<&Arc<dyn Check>> {
        self.registry.get(id).map(|entry| &entry.check)
    }

    /// Returns the resolved interval of the check with the given identity.
    pub fn interval(&self, id: &CheckId) -> Option<Duration> {
        self.registry.get(id).map(|entry| entry.interval)
    }

    /// Enqueues every check due at `now`.
    ///
    /// Never waits on the work queue. Due checks are visited in due order, and each has its due time advanced by exactly
    /// one interval, whether or not it made it onto the queue.
    pub fn tick(&mut self, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();

        let mut due = self
            .registry
            .iter()
            .filter(|(_, entry)| entry.next_due <= now)
            .map(|(id, entry)| (entry.next_due, id.clone()))
            .collect::<Vec<_>>();
        due.sort_unstable();
        summary.due = due.len();

        for (due_at, id) in due {
            let Some(entry) = self.registry.get_mut(&id) else {
                continue;
            };

            let Some(next_due) = entry.next_due.checked_add(entry.interval) else {
                error!(check.id = %id, "Next due time is out of range. Unscheduling check.");
                self.registry.remove(&id);
                continue;
            };
            entry.next_due = next_due;
            if next_due <= now {
                debug!(
                    check.id = %id,
                    behind_ms = now.saturating_duration_since(due_at).as_millis() as u64,
                    "Check is behind schedule."
                );
            }

            let item = WorkItem {
                check: Arc::clone(&entry.check),
                id: id.clone(),
                due: due_at,
            };
            match self.work_tx.try_send(item) {
                Ok(()) => summary.enqueued += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(check.id = %id, "Work queue is full. Dropping check run.");
                    summary.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    summary.queue_closed = true;
                    break;
                }
            }
        }

        telemetry::checks_enqueued(summary.enqueued as u64);
        telemetry::checks_dropped(DropReason::QueueFull, summary.dropped as u64);

        summary
    }

    /// Runs the scheduling loop until shutdown is signalled or the work queue is closed.
    pub async fn run(mut self, mut shutdown: ShutdownHandle) {
        info!(
            checks = self.registry.len(),
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Scheduler started."
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let lateness_threshold = self.tick_interval * 2;

        loop {
            select! {
                biased;

                _ = &mut shutdown => {
                    info!("Scheduler stopping.");
                    break;
                }

                scheduled_at = ticker.tick() => {
                    let now = Instant::now();
                    let lateness = now.saturating_duration_since(scheduled_at);
                    if lateness > lateness_threshold {
                        warn!(lateness_ms = lateness.as_millis() as u64, "Scheduler tick is running late.");
                    }

                    let summary = self.tick(now);
                    if summary.queue_closed {
                        error!("Work queue closed. Stopping scheduler.");
                        break;
                    }
                }
            }
        }
    }
}
