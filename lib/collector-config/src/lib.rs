//! Layered configuration for the collector.
//!
//! Configuration is assembled from an ordered list of sources, where each source added later takes precedence over
//! the ones before it. Supported sources are YAML files, prefixed environment variables, and in-memory
//! serializable values (mostly useful for defaults and tests).
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, collections::BTreeSet, path::Path, sync::Arc};

use collector_error::GenericError;
use figment::{
    error::Kind,
    providers::{Env, Serialized},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

mod source;
use self::source::YamlFileSource;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// A configuration file could not be read or parsed.
    #[snafu(display("Failed to load configuration file '{}'.", path))]
    File {
        /// Path of the offending file.
        path: String,

        /// Error source.
        source: figment::Error,
    },

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text listing the keys that could be set to provide the field.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field had a different data type than expected.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Any other configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

struct BoxedSource(Box<dyn Provider + Send + Sync>);

impl Provider for BoxedSource {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// Builds a configuration from multiple sources.
///
/// Sources are merged in the order they are added: a value from a later source overrides the same key from an earlier
/// one.
#[derive(Default)]
pub struct ConfigurationLoader {
    sources: Vec<BoxedSource>,
    env_prefixes: BTreeSet<String>,
}

impl ConfigurationLoader {
    fn push<P>(&mut self, provider: P)
    where
        P: Provider + Send + Sync + 'static,
    {
        self.sources.push(BoxedSource(Box::new(provider)));
    }

    /// Adds the given YAML file as a source.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, or is not valid YAML, an error is returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let source = YamlFileSource::read(&path).context(File {
            path: path.as_ref().display().to_string(),
        })?;
        self.push(source);
        Ok(self)
    }

    /// Adds the given YAML file as a source if it can be loaded, and otherwise carries on without it.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        match YamlFileSource::read(&path) {
            Ok(source) => self.push(source),
            Err(e) => {
                debug!(error = %e, file_path = %path.as_ref().display(), "Unable to load YAML configuration file. Ignoring.");
            }
        }
        self
    }

    /// Adds environment variables starting with the given prefix as a source.
    ///
    /// An underscore is appended to the prefix when missing, so a prefix of `collector` matches `COLLECTOR_LOG_LEVEL`
    /// and exposes it as `log_level`. Matching is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error is returned.
    pub fn from_environment(mut self, prefix: &str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        // `Env` is not `Send + Sync`, so the matching variables are captured now as a serialized snapshot.
        let values = Env::prefixed(&prefix).data().map_err(|e| ConfigurationError::Generic { source: e.into() })?;
        if let Some(dict) = values.get(&figment::Profile::Default) {
            self.push(Serialized::defaults(dict.clone()));
        }
        self.env_prefixes.insert(prefix);

        Ok(self)
    }

    /// Adds an in-memory, serializable value as a source.
    ///
    /// The value must serialize to a map, such as a struct or a `serde_json::Value::Object`.
    pub fn from_values<T>(mut self, values: T) -> Self
    where
        T: Serialize,
    {
        match Serialized::defaults(values).data() {
            Ok(data) => {
                if let Some(dict) = data.get(&figment::Profile::Default) {
                    self.push(Serialized::defaults(dict.clone()));
                }
            }
            Err(e) => debug!(error = %e, "Unable to serialize in-memory configuration values. Ignoring."),
        }
        self
    }

    /// Consumes the loader, merging all sources into a [`GenericConfiguration`].
    pub fn into_generic(self) -> GenericConfiguration {
        let figment = self
            .sources
            .into_iter()
            .fold(Figment::new(), |figment, source| figment.admerge(source));

        GenericConfiguration {
            inner: Arc::new(Inner {
                figment,
                env_prefixes: self.env_prefixes,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    env_prefixes: BTreeSet<String>,
}

/// A merged, queryable configuration.
///
/// Keys use `a.b.c` notation for nested values. Since environment variables can't express nesting, a nested key that
/// isn't found is looked up again with periods replaced by underscores (`a_b_c`).
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) if matches!(e.kind, Kind::MissingField(_)) && key.contains('.') => self
                .inner
                .figment
                .extract_inner(&key.replace('.', "_"))
                .map_err(|e| self.map_error(e)),
            Err(e) => Err(self.map_error(e)),
        }
    }

    fn map_error(&self, e: figment::Error) -> ConfigurationError {
        match e.kind {
            Kind::MissingField(field) => {
                let mut keys = vec![field.to_string()];
                keys.extend(
                    self.inner
                        .env_prefixes
                        .iter()
                        .map(|prefix| format!("{}{}", prefix, field.replace('.', "_").to_uppercase())),
                );
                let help_text = format!("Try setting `{}`.", keys.join("` or `"));

                ConfigurationError::MissingField { help_text, field }
            }
            Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => ConfigurationError::Generic { source: e.into() },
        }
    }

    /// Gets the value at `key`, if present.
    ///
    /// # Errors
    ///
    /// If the key exists but can't be deserialized as `T`, an error is returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deserializes the whole configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration can't be deserialized as `T`, an error is returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner.figment.extract().map_err(|e| self.map_error(e))
    }
}
