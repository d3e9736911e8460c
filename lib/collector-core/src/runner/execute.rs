use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use futures::FutureExt as _;
use tokio::time::{timeout, Instant};

use crate::{
    check::{Check, CheckId},
    outcome::{FailureKind, RunFailure, RunOutcome, RunResult},
};

/// Runs a check once, turning errors, panics, and timeouts into failure outcomes.
///
/// When the timeout elapses, the run future is dropped. Nothing the check does can make this panic: if describing the
/// check panics, the outcome is described by `id` instead.
pub(super) async fn execute(check: Arc<dyn Check>, id: CheckId, run_timeout: Duration) -> RunOutcome {
    let started_at = Utc::now();
    let start = Instant::now();

    let result = match timeout(run_timeout, AssertUnwindSafe(check.run()).catch_unwind()).await {
        Ok(Ok(Ok(submissions))) => RunResult::Success(submissions),
        Ok(Ok(Err(e))) => RunResult::Failure(RunFailure::new(FailureKind::Error, format!("{:#}", e))),
        Ok(Err(payload)) => RunResult::Failure(RunFailure::new(FailureKind::Panic, panic_message(payload.as_ref()))),
        Err(_) => RunResult::Failure(RunFailure::new(
            FailureKind::TimedOut,
            format!("check did not complete within {:?}", run_timeout),
        )),
    };

    let description = catch_unwind(AssertUnwindSafe(|| check.describe())).unwrap_or_else(|_| id.to_string());

    RunOutcome {
        check_id: id,
        description,
        started_at,
        duration: start.elapsed(),
        result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("check panicked with a non-string payload")
    }
}
