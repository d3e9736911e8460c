use collector_config::GenericConfiguration;
use collector_error::{generic_error, ErrorContext as _, GenericError};
use serde::Deserialize;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn default_log_level() -> LogLevel {
    LevelFilter::INFO.into()
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
///
/// Read from the top level of the collector configuration:
///
/// - `log_level`: filtering directives in `EnvFilter` syntax, such as `info` or `warn,collector_core=debug` (default: `info`)
/// - `log_format_json`: whether to write JSON instead of the pipe-delimited text format (default: `false`)
/// - `log_to_console`: whether to write to standard output (default: `true`)
/// - `log_file`: path of a file to also write logs to (default: empty, disabled)
#[derive(Deserialize)]
pub struct LoggingConfiguration {
    #[serde(default = "default_log_level")]
    pub(crate) log_level: LogLevel,

    #[serde(default)]
    pub(crate) log_format_json: bool,

    #[serde(default = "default_true")]
    pub(crate) log_to_console: bool,

    #[serde(default)]
    pub(crate) log_file: String,
}

impl LoggingConfiguration {
    /// Creates a new `LoggingConfiguration` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the logging settings are present but invalid, such as an unparseable log level, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        config
            .as_typed()
            .error_context("Failed to parse logging configuration.")
    }
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format_json: false,
            log_to_console: true,
            log_file: String::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct LogLevel(EnvFilter);

impl LogLevel {
    pub fn as_env_filter(&self) -> EnvFilter {
        // Rebuilt from its directives, as `EnvFilter` isn't `Clone` in every `tracing-subscriber` release.
        EnvFilter::new(self.0.to_string())
    }
}

impl From<LevelFilter> for LogLevel {
    fn from(level: LevelFilter) -> Self {
        Self(EnvFilter::default().add_directive(level.into()))
    }
}

impl TryFrom<String> for LogLevel {
    type Error = GenericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(generic_error!("Log level cannot be empty."));
        }

        EnvFilter::builder()
            .parse(value)
            .map(Self)
            .error_context("Failed to parse valid log level.")
    }
}

#[cfg(test)]
mod tests {
    use collector_config::ConfigurationLoader;
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_when_unset() {
        let config = ConfigurationLoader::default().into_generic();
        let logging = LoggingConfiguration::from_configuration(&config).unwrap();

        assert_eq!(logging.log_level.as_env_filter().to_string(), "info");
        assert!(!logging.log_format_json);
        assert!(logging.log_to_console);
        assert!(logging.log_file.is_empty());
    }

    #[test]
    fn parses_directives() {
        let config = ConfigurationLoader::default()
            .from_values(json!({ "log_level": "warn,collector_core=debug", "log_format_json": true }))
            .into_generic();
        let logging = LoggingConfiguration::from_configuration(&config).unwrap();

        let directives = logging.log_level.as_env_filter().to_string();
        assert!(directives.contains("collector_core=debug"), "{}", directives);
        assert!(logging.log_format_json);
    }

    #[test]
    fn rejects_empty_log_level() {
        let config = ConfigurationLoader::default()
            .from_values(json!({ "log_level": "  " }))
            .into_generic();
        assert!(LoggingConfiguration::from_configuration(&config).is_err());
    }
}
