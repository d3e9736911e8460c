//! Config providers.

use async_trait::async_trait;
use snafu::Snafu;
use tracing::{debug, warn};

use crate::config::CheckConfig;

/// A config provider error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ProviderError {
    /// The configuration source could not be reached.
    #[snafu(display("provider '{}' is unreachable: {}", provider, reason))]
    Unreachable {
        /// Name of the provider.
        provider: String,

        /// Why the source could not be reached.
        reason: String,
    },

    /// The configuration source was reached but its contents could not be understood.
    #[snafu(display("provider '{}' returned malformed configuration: {}", provider, reason))]
    Malformed {
        /// Name of the provider.
        provider: String,

        /// What was wrong with the configuration.
        reason: String,
    },
}

/// A source of raw check configurations.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Gets the name of this provider.
    fn name(&self) -> &str;

    /// Collects every check configuration currently available from this source.
    ///
    /// # Errors
    ///
    /// If the source is unreachable or its contents are malformed, an error is returned.
    async fn collect(&self) -> Result<Vec<CheckConfig>, ProviderError>;
}

/// A provider that always returns a fixed set of configurations.
#[derive(Clone, Debug)]
pub struct StaticConfigProvider {
    name: String,
    configs: Vec<CheckConfig>,
}

impl StaticConfigProvider {
    /// Creates a new `StaticConfigProvider` with the given name and configurations.
    pub fn new(name: impl Into<String>, configs: Vec<CheckConfig>) -> Self {
        Self {
            name: name.into(),
            configs,
        }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> Result<Vec<CheckConfig>, ProviderError> {
        Ok(self.configs.clone())
    }
}

/// Collects configurations from every provider, in order.
///
/// The result is the concatenation of each provider's configurations, in provider order and then emission order. A
/// failing provider is logged and contributes nothing. No deduplication is done.
pub async fn collect_configs(providers: &[Box<dyn ConfigProvider>]) -> Vec<CheckConfig> {
    let mut configs = Vec::new();

    for provider in providers {
        match provider.collect().await {
            Ok(provided) => {
                debug!(provider = provider.name(), configs = provided.len(), "Collected check configurations.");
                configs.extend(provided);
            }
            Err(e) => warn!(provider = provider.name(), error = %e, "Failed to collect check configurations. Skipping provider."),
        }
    }

    configs
}
