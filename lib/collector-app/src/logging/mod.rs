//! Logging.

use std::path::Path;

use collector_error::{generic_error, GenericError};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

mod config;
pub use self::config::LoggingConfiguration;

mod layer;
use self::layer::build_formatting_layer;

/// Keeps the non-blocking log writers alive.
///
/// Must be held until the process is about to exit: dropping it flushes any buffered log lines.
#[derive(Default)]
pub struct LoggingGuard {
    worker_guards: Vec<WorkerGuard>,
}

impl LoggingGuard {
    fn add_worker_guard(&mut self, guard: WorkerGuard) {
        self.worker_guards.push(guard);
    }
}

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the global `tracing` subscriber.
///
/// One formatting layer is installed per configured output (console, file), all sharing a single level filter built
/// from `log_level`. Writes go through `tracing-appender` non-blocking writers so a slow terminal or disk never stalls
/// the scheduler or runner tasks.
///
/// # Errors
///
/// If the log file can't be opened, or a global subscriber was already installed, an error is returned.
pub fn initialize_logging(config: &LoggingConfiguration) -> Result<LoggingGuard, GenericError> {
    let mut layers = Vec::new();
    let mut guard = LoggingGuard::default();

    if config.log_to_console {
        let (writer, worker_guard) = tracing_appender::non_blocking(std::io::stdout());
        guard.add_worker_guard(worker_guard);
        layers.push(build_formatting_layer(config, writer));
    }

    if !config.log_file.is_empty() {
        let path = Path::new(&config.log_file);
        let file_name = path
            .file_name()
            .ok_or_else(|| generic_error!("Invalid log file path '{}'.", config.log_file))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name.to_string_lossy())
            .build(directory)
            .map_err(|e| generic_error!("Failed to open log file '{}': {}", config.log_file, e))?;
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard.add_worker_guard(worker_guard);
        layers.push(build_formatting_layer(config, writer));
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(config.log_level.as_env_filter()))
        .try_init()?;

    Ok(guard)
}
