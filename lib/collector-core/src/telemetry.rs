//! Internal telemetry.
//!
//! Emitted through the `metrics` facade. Nothing is recorded unless the embedding process installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

/// Why a scheduled occurrence of a check never ran.
#[derive(Clone, Copy, Debug)]
pub(crate) enum DropReason {
    QueueFull,
    AlreadyRunning,
    Abandoned,
}

impl DropReason {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::AlreadyRunning => "already_running",
            Self::Abandoned => "abandoned",
        }
    }
}

pub(crate) fn checks_registered() {
    counter!("collector_checks_registered_total").increment(1);
}

pub(crate) fn checks_enqueued(count: u64) {
    if count > 0 {
        counter!("collector_checks_enqueued_total").increment(count);
    }
}

pub(crate) fn checks_dropped(reason: DropReason, count: u64) {
    if count > 0 {
        counter!("collector_checks_dropped_total", "reason" => reason.as_str()).increment(count);
    }
}

pub(crate) fn check_run(status: &'static str, duration: Duration) {
    counter!("collector_check_runs_total", "status" => status).increment(1);
    histogram!("collector_check_run_duration_seconds").record(duration.as_secs_f64());
}
