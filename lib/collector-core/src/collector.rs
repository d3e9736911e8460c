//! Collector bootstrap.
//!
//! Wires providers, loaders, the scheduler, and the runner together: every configuration is collected and resolved,
//! and every resolved check registered, before anything starts running.

use std::{sync::Arc, time::Duration};

use collector_config::GenericConfiguration;
use collector_error::{generic_error, ErrorContext as _, GenericError};
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tokio::{select, task::JoinHandle};
use tracing::{debug, error, info};

use crate::{
    check::{Check, CheckId},
    loader::{resolve_check, CheckLoader},
    provider::{collect_configs, ConfigProvider},
    runner::{Runner, RunnerConfig, DEFAULT_CHECK_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT},
    scheduler::{work_queue, Scheduler, DEFAULT_TICK_INTERVAL},
    shutdown::ShutdownCoordinator,
    sink::{LoggingSink, OutcomeSink, TelemetrySink},
};

const fn default_queue_capacity() -> usize {
    10
}

const fn default_runners() -> usize {
    1
}

const fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

const fn default_check_timeout() -> Duration {
    DEFAULT_CHECK_TIMEOUT
}

const fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

/// Collector configuration.
///
/// Read from the top level of the collector configuration:
///
/// - `check_queue_capacity`: capacity of the queue between the scheduler and the runner (default: 10)
/// - `check_runners`: number of checks that may run at the same time (default: 1)
/// - `scheduler_tick_interval_ms`: how often the scheduler looks for due checks (default: 1000)
/// - `check_timeout_secs`: maximum duration of a single check run (default: 30)
/// - `shutdown_timeout_secs`: grace period for in-flight runs during shutdown (default: 10)
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct CollectorConfiguration {
    #[serde(rename = "check_queue_capacity", default = "default_queue_capacity")]
    queue_capacity: usize,

    #[serde(rename = "check_runners", default = "default_runners")]
    runners: usize,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "scheduler_tick_interval_ms", default = "default_tick_interval")]
    tick_interval: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "check_timeout_secs", default = "default_check_timeout")]
    check_timeout: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "shutdown_timeout_secs", default = "default_shutdown_timeout")]
    shutdown_timeout: Duration,
}

impl CollectorConfiguration {
    /// Creates a new `CollectorConfiguration` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the settings can't be parsed, or are invalid, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let config: Self = config
            .as_typed()
            .error_context("Failed to parse collector configuration.")?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the capacity of the work queue.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the number of checks that may run at the same time.
    pub fn with_runners(mut self, runners: usize) -> Self {
        self.runners = runners;
        self
    }

    /// Sets the scheduler tick interval.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Sets the maximum duration of a single check run.
    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    /// Sets the grace period given to in-flight runs during shutdown.
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// If the queue capacity, the number of runners, the tick interval, or the check timeout is zero, an error is
    /// returned.
    pub fn validate(&self) -> Result<(), GenericError> {
        if self.queue_capacity == 0 {
            return Err(generic_error!("`check_queue_capacity` must be greater than zero."));
        }
        if self.runners == 0 {
            return Err(generic_error!("`check_runners` must be greater than zero."));
        }
        if self.tick_interval.is_zero() {
            return Err(generic_error!("`scheduler_tick_interval_ms` must be greater than zero."));
        }
        if self.check_timeout.is_zero() {
            return Err(generic_error!("`check_timeout_secs` must be greater than zero."));
        }
        Ok(())
    }

    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            workers: self.runners,
            check_timeout: self.check_timeout,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

impl Default for CollectorConfiguration {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            runners: default_runners(),
            tick_interval: default_tick_interval(),
            check_timeout: default_check_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Counts from the initial load of check configurations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadSummary {
    /// Number of configurations collected from all providers.
    pub collected: usize,

    /// Number of configurations resolved into a check.
    pub resolved: usize,

    /// Number of configurations no loader could resolve.
    pub unresolved: usize,

    /// Number of registrations that replaced an earlier check with the same identity.
    pub replaced: usize,

    /// Number of distinct checks scheduled.
    pub scheduled: usize,
}

/// Builds a [`Collector`].
pub struct CollectorBuilder {
    config: CollectorConfiguration,
    providers: Vec<Box<dyn ConfigProvider>>,
    loaders: Vec<Box<dyn CheckLoader>>,
    sink: Option<Arc<dyn OutcomeSink>>,
}

impl CollectorBuilder {
    /// Creates a new `CollectorBuilder` with the given configuration.
    pub fn new(config: CollectorConfiguration) -> Self {
        Self {
            config,
            providers: Vec::new(),
            loaders: Vec::new(),
            sink: None,
        }
    }

    /// Adds a config provider.
    ///
    /// Providers are consulted in the order they are added.
    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: ConfigProvider + 'static,
    {
        self.providers.push(Box::new(provider));
        self
    }

    /// Adds a check loader.
    ///
    /// Loaders are tried in the order they are added.
    pub fn with_loader<L>(mut self, loader: L) -> Self
    where
        L: CheckLoader + 'static,
    {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Sets the sink that receives run outcomes.
    ///
    /// Defaults to [`LoggingSink`]. Run telemetry is recorded regardless of the sink.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: OutcomeSink + 'static,
    {
        self.sink = Some(Arc::new(TelemetrySink::new(sink)));
        self
    }

    /// Collects, resolves, and registers every check.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, an error is returned. Failing providers and unresolvable configurations are
    /// logged and skipped.
    pub async fn build(self) -> Result<Collector, GenericError> {
        self.config.validate()?;

        let configs = collect_configs(&self.providers).await;

        let (work_tx, work_rx) = work_queue(self.config.queue_capacity);
        let mut scheduler = Scheduler::new(work_tx).with_tick_interval(self.config.tick_interval);

        let mut summary = LoadSummary {
            collected: configs.len(),
            ..LoadSummary::default()
        };
        for config in &configs {
            match resolve_check(&self.loaders, config) {
                Some(check) => {
                    summary.resolved += 1;
                    if scheduler.register(check).is_some() {
                        summary.replaced += 1;
                    }
                }
                None => summary.unresolved += 1,
            }
        }
        summary.scheduled = scheduler.len();

        info!(
            collected = summary.collected,
            scheduled = summary.scheduled,
            unresolved = summary.unresolved,
            replaced = summary.replaced,
            "Loaded checks."
        );

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TelemetrySink::new(LoggingSink)));
        let runner = Runner::new(work_rx, sink, self.config.runner_config());

        Ok(Collector {
            scheduler,
            runner,
            loaders: self.loaders,
            summary,
        })
    }
}

/// A fully loaded collector that has not started running yet.
pub struct Collector {
    scheduler: Scheduler,
    runner: Runner,
    loaders: Vec<Box<dyn CheckLoader>>,
    summary: LoadSummary,
}

impl Collector {
    /// Returns the counts from the initial load.
    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Registers an additional check, due immediately.
    ///
    /// If a check with the same identity is already registered, it is replaced and returned.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Option<Arc<dyn Check>> {
        self.scheduler.register(check)
    }

    /// Returns `true` if a check with the given identity is scheduled.
    pub fn is_scheduled(&self, id: &CheckId) -> bool {
        self.scheduler.is_scheduled(id)
    }

    /// Returns the number of scheduled checks.
    pub fn scheduled(&self) -> usize {
        self.scheduler.len()
    }

    /// Starts the runner and then the scheduler, each on its own task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> RunningCollector {
        let coordinator = ShutdownCoordinator::default();

        let runner_task = tokio::spawn(self.runner.run(coordinator.register()));
        let scheduler_task = tokio::spawn(self.scheduler.run(coordinator.register()));

        RunningCollector {
            coordinator: Some(coordinator),
            scheduler_task: Some(scheduler_task),
            runner_task: Some(runner_task),
            loaders: self.loaders,
        }
    }
}

/// A running collector.
pub struct RunningCollector {
    coordinator: Option<ShutdownCoordinator>,
    scheduler_task: Option<JoinHandle<()>>,
    runner_task: Option<JoinHandle<()>>,
    loaders: Vec<Box<dyn CheckLoader>>,
}

impl RunningCollector {
    /// Waits until the scheduler or the runner stops without having been asked to.
    ///
    /// Returns an error describing which task stopped. If a task has already stopped, returns immediately.
    pub async fn wait_for_unexpected_finish(&mut self) -> GenericError {
        let (Some(scheduler_task), Some(runner_task)) = (self.scheduler_task.as_mut(), self.runner_task.as_mut()) else {
            return generic_error!("Collector is no longer running.");
        };

        let (task_name, result) = select! {
            result = scheduler_task => ("scheduler", result),
            result = runner_task => ("runner", result),
        };

        match task_name {
            "scheduler" => self.scheduler_task = None,
            _ => self.runner_task = None,
        }

        match result {
            Ok(()) => generic_error!("Collector {} stopped unexpectedly.", task_name),
            Err(e) => generic_error!("Collector {} task failed: {}", task_name, e),
        }
    }

    /// Stops the scheduler and the runner, waits for both, and then shuts down every loader.
    pub async fn shutdown(mut self) {
        info!("Stopping collector.");

        if let Some(coordinator) = self.coordinator.take() {
            let woken = coordinator.shutdown();
            debug!(tasks = woken, "Signalled collector tasks to stop.");
        }

        for (task_name, task) in [("scheduler", self.scheduler_task.take()), ("runner", self.runner_task.take())] {
            if let Some(task) = task {
                if let Err(e) = task.await {
                    error!(task = task_name, error = %e, "Collector task failed.");
                }
            }
        }

        for loader in &self.loaders {
            loader.shutdown();
        }

        info!("Collector stopped.");
    }
}

#[cfg(test)]
mod tests {
    use collector_config::ConfigurationLoader;
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults() {
        let config = ConfigurationLoader::default().into_generic();
        let config = CollectorConfiguration::from_configuration(&config).unwrap();

        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.runners, 1);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.check_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_overrides() {
        let config = ConfigurationLoader::default()
            .from_values(json!({
                "check_queue_capacity": 32,
                "check_runners": 4,
                "scheduler_tick_interval_ms": 250,
                "check_timeout_secs": 5,
            }))
            .into_generic();
        let config = CollectorConfiguration::from_configuration(&config).unwrap();

        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.runners, 4);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.check_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_values() {
        for key in [
            "check_queue_capacity",
            "check_runners",
            "scheduler_tick_interval_ms",
            "check_timeout_secs",
        ] {
            let config = ConfigurationLoader::default()
                .from_values(json!({ key: 0 }))
                .into_generic();
            let error = CollectorConfiguration::from_configuration(&config).unwrap_err();
            assert!(error.to_string().contains(key), "{}: {}", key, error);
        }
    }
}
