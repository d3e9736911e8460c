//! Check collection engine.
//!
//! Checks are discovered through [config providers][provider::ConfigProvider], turned into runnable checks by
//! [check loaders][loader::CheckLoader], and then run periodically: the [scheduler][scheduler::Scheduler] decides when
//! each check is due and hands it to the [runner][runner::Runner] over a bounded queue, and the runner executes it in
//! isolation and reports the [outcome][outcome::RunOutcome] to a [sink][sink::OutcomeSink].
//!
//! [`CollectorBuilder`][collector::CollectorBuilder] wires all of this together.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod check;
pub mod collector;
pub mod config;
pub mod loader;
pub mod outcome;
pub mod provider;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
mod telemetry;

/// Common imports.
pub mod prelude {
    pub use crate::check::{Check, CheckId, CheckMetadata, ServiceCheckStatus, Submission};
    pub use crate::collector::{Collector, CollectorBuilder, CollectorConfiguration, LoadSummary, RunningCollector};
    pub use crate::config::{CheckConfig, Data};
    pub use crate::loader::{CheckLoader, LoadError};
    pub use crate::outcome::{FailureKind, RunOutcome, RunResult};
    pub use crate::provider::{ConfigProvider, ProviderError};
    pub use crate::sink::{ChannelSink, LoggingSink, OutcomeSink, TelemetrySink};
}
