//! Checks.

use std::time::Duration;

use async_trait::async_trait;
use collector_error::GenericError;

use crate::config::CheckConfig;

mod id;
pub use self::id::CheckId;

mod submission;
pub use self::submission::{Event, MetricSample, ServiceCheck, ServiceCheckStatus, Submission};

/// A check.
///
/// Checks run some arbitrary chunk of logic on a configured interval, producing submissions such as metrics, events,
/// and service checks. A check is shared between the scheduler and the runner, so running it only takes `&self`.
#[async_trait]
pub trait Check: Send + Sync {
    /// Gets the identity of this check instance.
    fn id(&self) -> &CheckId;

    /// Gets the interval at which this check should run.
    fn interval(&self) -> Duration;

    /// Runs the check.
    ///
    /// # Errors
    ///
    /// If a problem occurs while running the check, an error is returned. The check stays scheduled and will run
    /// again on its next interval.
    async fn run(&self) -> Result<Vec<Submission>, GenericError>;

    /// Gets a human-readable description of this check, used in logs and run outcomes.
    fn describe(&self) -> String {
        self.id().to_string()
    }
}

/// Identity and scheduling details common to every check instance.
///
/// Checks built from a [`CheckConfig`] can embed this and delegate [`Check::id`] and [`Check::interval`] to it.
#[derive(Clone, Debug)]
pub struct CheckMetadata {
    id: CheckId,
    name: String,
    interval: Duration,
    source: String,
}

impl CheckMetadata {
    /// Creates a new `CheckMetadata` from the given configuration.
    pub fn from_config(config: &CheckConfig) -> Self {
        Self {
            id: config.id(),
            name: config.name().to_string(),
            interval: config.interval(),
            source: config.source().to_string(),
        }
    }

    /// Returns the identity of the check instance.
    pub fn id(&self) -> &CheckId {
        &self.id
    }

    /// Returns the check name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved execution interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns where the configuration of this check came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns a description of the check instance.
    pub fn describe(&self) -> String {
        format!("{} [{}] from {}", self.name, self.id, self.source)
    }
}
