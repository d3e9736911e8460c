//! Check run outcomes.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};

use crate::check::{CheckId, Submission};

/// Result of a single check run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Identity of the check that ran.
    pub check_id: CheckId,

    /// Description of the check that ran.
    pub description: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// How long the run took.
    pub duration: Duration,

    /// What the run produced.
    pub result: RunResult,
}

impl RunOutcome {
    /// Returns `true` if the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.result, RunResult::Success(_))
    }

    /// Returns the failure, if the run failed.
    pub fn failure(&self) -> Option<&RunFailure> {
        match &self.result {
            RunResult::Success(_) => None,
            RunResult::Failure(failure) => Some(failure),
        }
    }

    /// Returns a label describing the result, suitable for metrics.
    pub fn status(&self) -> &'static str {
        match &self.result {
            RunResult::Success(_) => "success",
            RunResult::Failure(failure) => failure.kind.as_str(),
        }
    }
}

/// What a check run produced.
#[derive(Clone, Debug)]
pub enum RunResult {
    /// The run completed and produced these submissions.
    Success(Vec<Submission>),

    /// The run failed.
    Failure(RunFailure),
}

/// Details of a failed check run.
#[derive(Clone, Debug)]
pub struct RunFailure {
    /// How the run failed.
    pub kind: FailureKind,

    /// Error message, panic payload, or timeout description.
    pub detail: String,

    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
}

impl RunFailure {
    pub(crate) fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// How a check run failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The check returned an error.
    Error,

    /// The check panicked.
    Panic,

    /// The check did not complete within the run timeout and was cancelled.
    TimedOut,
}

impl FailureKind {
    /// Returns the name of this failure kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Panic => "panic",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
