//! Outcome sinks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    outcome::{RunOutcome, RunResult},
    telemetry,
};

/// Receives the outcome of every check run.
///
/// `report` is called from the runner dispatcher and must not block: implementations that forward outcomes elsewhere
/// should buffer or drop rather than wait.
pub trait OutcomeSink: Send + Sync {
    /// Reports the outcome of a check run.
    fn report(&self, outcome: RunOutcome);
}

impl<S> OutcomeSink for Arc<S>
where
    S: OutcomeSink + ?Sized,
{
    fn report(&self, outcome: RunOutcome) {
        (**self).report(outcome)
    }
}

/// A sink that logs each outcome.
///
/// Submissions of successful runs are logged at debug level. Failures are already logged by the runner, so they are
/// only noted here at debug level as well.
#[derive(Clone, Debug, Default)]
pub struct LoggingSink;

impl OutcomeSink for LoggingSink {
    fn report(&self, outcome: RunOutcome) {
        match &outcome.result {
            RunResult::Success(submissions) => {
                debug!(
                    check.id = %outcome.check_id,
                    submissions = submissions.len(),
                    duration_ms = outcome.duration.as_millis() as u64,
                    "Check run completed."
                );
                for submission in submissions {
                    debug!(check.id = %outcome.check_id, "{}", submission);
                }
            }
            RunResult::Failure(failure) => {
                debug!(
                    check.id = %outcome.check_id,
                    kind = %failure.kind,
                    duration_ms = outcome.duration.as_millis() as u64,
                    "Check run failed."
                );
            }
        }
    }
}

/// A sink that forwards outcomes over a bounded channel.
///
/// When the channel is full, the outcome is dropped with a warning.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<RunOutcome>,
}

impl ChannelSink {
    /// Creates a new `ChannelSink` with the given capacity, returning the sink and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RunOutcome>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl OutcomeSink for ChannelSink {
    fn report(&self, outcome: RunOutcome) {
        if let Err(e) = self.tx.try_send(outcome) {
            let outcome = match &e {
                mpsc::error::TrySendError::Full(outcome) | mpsc::error::TrySendError::Closed(outcome) => outcome,
            };
            warn!(check.id = %outcome.check_id, error = %e, "Dropping check run outcome.");
        }
    }
}

/// A sink that records run telemetry before forwarding to another sink.
#[derive(Clone, Debug)]
pub struct TelemetrySink<S> {
    inner: S,
}

impl<S> TelemetrySink<S> {
    /// Creates a new `TelemetrySink` wrapping the given sink.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: OutcomeSink> OutcomeSink for TelemetrySink<S> {
    fn report(&self, outcome: RunOutcome) {
        telemetry::check_run(outcome.status(), outcome.duration);
        self.inner.report(outcome);
    }
}
