//! Check loaders.

use std::sync::Arc;

use snafu::Snafu;
use tracing::{debug, warn};

use crate::{check::Check, config::CheckConfig};

/// A check loader error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum LoadError {
    /// The loader does not know how to build checks of this kind.
    #[snafu(display("unknown check '{}'", name))]
    UnknownCheck {
        /// Name of the check.
        name: String,
    },

    /// The loader knows the check, but the configuration is not valid for it.
    #[snafu(display("invalid configuration for check '{}': {}", name, reason))]
    InvalidConfiguration {
        /// Name of the check.
        name: String,

        /// What was wrong with the configuration.
        reason: String,
    },
}

/// Turns raw configurations into runnable checks.
///
/// Loaders are tried in a fixed order for each configuration until one succeeds. The scheduler and runner never learn
/// which loader produced a given check.
pub trait CheckLoader: Send + Sync {
    /// Gets the name of this loader.
    fn name(&self) -> &str;

    /// Loads a check from the given configuration.
    ///
    /// # Errors
    ///
    /// If this loader cannot produce a check for the configuration, an error is returned.
    fn load(&self, config: &CheckConfig) -> Result<Arc<dyn Check>, LoadError>;

    /// Releases any process-wide state held by this loader.
    ///
    /// Called once, after every check has stopped running.
    fn shutdown(&self) {}
}

impl<L> CheckLoader for Arc<L>
where
    L: CheckLoader + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self, config: &CheckConfig) -> Result<Arc<dyn Check>, LoadError> {
        (**self).load(config)
    }

    fn shutdown(&self) {
        (**self).shutdown()
    }
}

/// Resolves a configuration into a check, trying each loader in order.
///
/// Returns the check built by the first loader that succeeds, or `None` if every loader fails.
pub fn resolve_check(loaders: &[Box<dyn CheckLoader>], config: &CheckConfig) -> Option<Arc<dyn Check>> {
    for loader in loaders {
        match loader.load(config) {
            Ok(check) => {
                debug!(loader = loader.name(), check.id = %check.id(), "Loaded check.");
                return Some(check);
            }
            Err(e) => debug!(loader = loader.name(), check.name = config.name(), error = %e, "Loader could not load check."),
        }
    }

    warn!(
        check.name = config.name(),
        source = config.source(),
        loaders = loaders.len(),
        "No loader could load check. Dropping configuration."
    );
    None
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use collector_error::GenericError;

    use super::*;
    use crate::{
        check::{CheckId, Submission},
        config::Data,
    };

    struct NamedCheck {
        id: CheckId,
        loader: &'static str,
    }

    #[async_trait]
    impl Check for NamedCheck {
        fn id(&self) -> &CheckId {
            &self.id
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(15)
        }

        async fn run(&self) -> Result<Vec<Submission>, GenericError> {
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            self.loader.to_string()
        }
    }

    struct CountingLoader {
        name: &'static str,
        kinds: &'static [&'static str],
        attempts: AtomicUsize,
    }

    impl CountingLoader {
        fn new(name: &'static str, kinds: &'static [&'static str]) -> Self {
            Self {
                name,
                kinds,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl CheckLoader for CountingLoader {
        fn name(&self) -> &str {
            self.name
        }

        fn load(&self, config: &CheckConfig) -> Result<Arc<dyn Check>, LoadError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.kinds.contains(&config.name()) {
                return UnknownCheck { name: config.name() }.fail();
            }
            Ok(Arc::new(NamedCheck {
                id: config.id(),
                loader: self.name,
            }))
        }
    }

    #[test]
    fn first_success_wins() {
        let first = Arc::new(CountingLoader::new("first", &["disk"]));
        let second = Arc::new(CountingLoader::new("second", &["disk", "http"]));
        let third = Arc::new(CountingLoader::new("third", &["http"]));
        let loaders: Vec<Box<dyn CheckLoader>> = vec![
            Box::new(Arc::clone(&first)),
            Box::new(Arc::clone(&second)),
            Box::new(Arc::clone(&third)),
        ];

        let config = CheckConfig::new("http", Data::default(), Data::default());
        let check = resolve_check(&loaders, &config).unwrap();

        assert_eq!(check.describe(), "second");
        assert_eq!(first.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(second.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(third.attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn all_loaders_failing_drops_config() {
        let loaders: Vec<Box<dyn CheckLoader>> = vec![Box::new(CountingLoader::new("only", &["disk"]))];
        let config = CheckConfig::new("redis", Data::default(), Data::default());

        assert!(resolve_check(&loaders, &config).is_none());
    }
}
