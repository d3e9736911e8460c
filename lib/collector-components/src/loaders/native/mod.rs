use std::{collections::HashMap, sync::Arc, time::Instant};

use collector_core::{
    check::Check,
    config::CheckConfig,
    loader::{CheckLoader, LoadError},
};
use tracing::debug;

mod tcp;
use self::tcp::TcpCheck;

mod uptime;
use self::uptime::UptimeCheck;

/// Builds a check from its configuration.
pub type BuildFn = fn(&CheckConfig, &LoaderContext) -> Result<Arc<dyn Check>, LoadError>;

/// State shared with every check built by a [`NativeCheckLoader`].
#[derive(Clone, Debug)]
pub struct LoaderContext {
    started: Instant,
}

impl LoaderContext {
    /// Returns when the loader was created.
    pub fn started(&self) -> Instant {
        self.started
    }
}

/// A check loader for checks compiled into the collector.
///
/// Checks are looked up by name in a registry of build functions. [`with_builtin_checks`][Self::with_builtin_checks]
/// registers the checks that ship with the collector:
///
/// - `uptime`: reports how long the collector has been running
/// - `tcp_check`: reports whether a TCP endpoint accepts connections, and how fast
pub struct NativeCheckLoader {
    checks: HashMap<&'static str, BuildFn>,
    context: LoaderContext,
}

impl NativeCheckLoader {
    /// Creates a new `NativeCheckLoader` with no registered checks.
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
            context: LoaderContext {
                started: Instant::now(),
            },
        }
    }

    /// Creates a new `NativeCheckLoader` with the built-in checks registered.
    pub fn with_builtin_checks() -> Self {
        Self::new()
            .with_check("uptime", UptimeCheck::build)
            .with_check("tcp_check", TcpCheck::build)
    }

    /// Registers a check under the given name, replacing any check previously registered with that name.
    pub fn with_check(mut self, name: &'static str, build: BuildFn) -> Self {
        self.checks.insert(name, build);
        self
    }

    /// Returns the names of the registered checks, sorted.
    pub fn check_names(&self) -> Vec<&'static str> {
        let mut names = self.checks.keys().copied().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl CheckLoader for NativeCheckLoader {
    fn name(&self) -> &str {
        "native"
    }

    fn load(&self, config: &CheckConfig) -> Result<Arc<dyn Check>, LoadError> {
        let build = self.checks.get(config.name()).ok_or_else(|| LoadError::UnknownCheck {
            name: config.name().to_string(),
        })?;

        debug!(check.name = config.name(), source = config.source(), "Building native check.");
        build(config, &self.context)
    }
}

/// Deserializes the instance parameters of `config` as `T`.
fn parse_instance<T>(config: &CheckConfig) -> Result<T, LoadError>
where
    T: serde::de::DeserializeOwned,
{
    serde_yaml::from_value(config.instance().to_value()).map_err(|e| LoadError::InvalidConfiguration {
        name: config.name().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use collector_core::config::Data;

    use super::*;

    fn config(name: &str, instance: Data) -> CheckConfig {
        CheckConfig::new(name, instance, Data::default())
    }

    #[test]
    fn builtin_checks_are_registered() {
        let loader = NativeCheckLoader::with_builtin_checks();
        assert_eq!(loader.check_names(), vec!["tcp_check", "uptime"]);
    }

    #[test]
    fn unknown_check_is_rejected() {
        let loader = NativeCheckLoader::with_builtin_checks();
        let error = loader.load(&config("redisdb", Data::default())).err().unwrap();
        assert!(matches!(error, LoadError::UnknownCheck { name } if name == "redisdb"));
    }

    #[test]
    fn invalid_instance_is_rejected() {
        let loader = NativeCheckLoader::with_builtin_checks();
        let instance = [("host", "localhost")].into_iter().collect::<Data>();
        let error = loader.load(&config("tcp_check", instance)).err().unwrap();
        assert!(matches!(error, LoadError::InvalidConfiguration { .. }), "{}", error);
    }

    #[test]
    fn loaded_check_keeps_config_identity() {
        let loader = NativeCheckLoader::with_builtin_checks();
        let config = config("uptime", Data::default());
        let check = loader.load(&config).unwrap();
        assert_eq!(check.id(), &config.id());
    }
}
