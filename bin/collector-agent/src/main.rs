//! Collector agent binary.
//!
//! This binary loads check configurations from a configuration directory, runs each check on its own interval, and
//! logs the result of every run.

#![deny(warnings)]
#![deny(missing_docs)]

use std::{path::PathBuf, time::Instant};

use collector_app::prelude::*;
use collector_components::{loaders::NativeCheckLoader, providers::FileConfigProvider};
use collector_config::ConfigurationLoader;
use collector_core::prelude::*;
use collector_error::{ErrorContext as _, GenericError};
use tokio::select;
use tracing::{error, info};

mod cli;

use self::cli::Cli;

/// Default path to the collector configuration file.
const COLLECTOR_CONF_YAML: &str = "/etc/collector/collector.yaml";

/// Default directory holding check configuration files.
const COLLECTOR_CONFD_PATH: &str = "/etc/collector/conf.d";

/// Environment variable prefix for collector configuration.
const COLLECTOR_ENV_VAR_PREFIX: &str = "COLLECTOR";

#[tokio::main]
async fn main() -> Result<(), GenericError> {
    let started = Instant::now();
    let cli: Cli = argh::from_env();

    // A configuration file given on the command line must load. The default one is optional.
    let (config_path, loader) = match cli.config_file {
        Some(path) => {
            let loader = ConfigurationLoader::default()
                .from_yaml(&path)
                .error_context("Failed to load collector configuration file.")?;
            (path, loader)
        }
        None => {
            let path = PathBuf::from(COLLECTOR_CONF_YAML);
            let loader = ConfigurationLoader::default().try_from_yaml(&path);
            (path, loader)
        }
    };
    let config = loader
        .from_environment(COLLECTOR_ENV_VAR_PREFIX)
        .error_context("Environment variable prefix should not be empty.")?
        .into_generic();

    let logging_config =
        LoggingConfiguration::from_configuration(&config).error_context("Failed to parse logging configuration.")?;
    let _logging_guard = match initialize_logging(&logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            fatal_and_exit(format!("failed to initialize logging: {:#}", e));
            return Ok(());
        }
    };

    let confd_path = match cli.confd_path {
        Some(path) => path,
        None => config
            .try_get_typed::<PathBuf>("confd_path")
            .error_context("Failed to parse `confd_path`.")?
            .unwrap_or_else(|| COLLECTOR_CONFD_PATH.into()),
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %config_path.display(),
        confd_path = %confd_path.display(),
        process_id = std::process::id(),
        "Collector agent starting..."
    );

    let collector_config =
        CollectorConfiguration::from_configuration(&config).error_context("Failed to load collector configuration.")?;

    let collector = CollectorBuilder::new(collector_config)
        .with_provider(FileConfigProvider::new(&[confd_path]))
        .with_loader(NativeCheckLoader::with_builtin_checks())
        .build()
        .await
        .error_context("Failed to build collector.")?;

    let summary = collector.summary();
    info!(
        collected = summary.collected,
        unresolved = summary.unresolved,
        scheduled = summary.scheduled,
        "Loaded check configurations."
    );

    let mut running = collector.spawn();
    info!(init_time_ms = started.elapsed().as_millis(), "Collector running.");

    select! {
        e = running.wait_for_unexpected_finish() => {
            error!(error = %e, "Collector task unexpectedly finished. Shutting down...");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    running.shutdown().await;
    info!("Collector stopped.");

    Ok(())
}
