//! Raw check configurations.

use std::{collections::BTreeMap, fmt, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::check::CheckId;

/// Interval used when a configuration does not specify a valid `min_collection_interval`.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Longest interval a check can run at. Longer `min_collection_interval` values are capped.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const MIN_COLLECTION_INTERVAL_KEY: &str = "min_collection_interval";

/// An opaque map of check parameters.
///
/// Used both for per-instance parameters and for the `init_config` block shared by every instance of a check.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Data(BTreeMap<String, serde_yaml::Value>);

impl Data {
    /// Creates a new `Data` from the given map.
    pub fn from_map(map: BTreeMap<String, serde_yaml::Value>) -> Self {
        Self(map)
    }

    /// Gets the value for the given key, if present.
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.get(key)
    }

    /// Gets the value for the given key as a string slice, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|value| value.as_str())
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the parameters, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_yaml::Value)> {
        self.0.iter()
    }

    /// Returns the parameters as a YAML mapping, suitable for `serde_yaml::from_value`.
    pub fn to_value(&self) -> serde_yaml::Value {
        serde_yaml::Value::Mapping(
            self.0
                .iter()
                .map(|(key, value)| (serde_yaml::Value::from(key.as_str()), value.clone()))
                .collect(),
        )
    }

    /// Serializes the parameters to YAML.
    ///
    /// Top-level keys are always emitted in sorted order, so two maps with the same parameters produce the same bytes.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        serde_yaml::to_string(&self.0).map(String::into_bytes).unwrap_or_default()
    }
}

impl<K, V> FromIterator<(K, V)> for Data
where
    K: Into<String>,
    V: Into<serde_yaml::Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The raw configuration of a single check instance, as produced by a config provider.
///
/// `name` selects which kind of check to load, `instance` holds the parameters of this particular instance, and
/// `init_config` holds the parameters shared by all instances of that check. A `CheckConfig` is never modified once a
/// provider has produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckConfig {
    name: String,
    instance: Data,
    init_config: Data,
    source: String,
}

impl CheckConfig {
    /// Creates a new `CheckConfig`.
    pub fn new(name: impl Into<String>, instance: Data, init_config: Data) -> Self {
        Self {
            name: name.into(),
            instance,
            init_config,
            source: String::from("unknown"),
        }
    }

    /// Sets where this configuration came from, such as a provider name or file path.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Returns the name of the check to load.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the instance parameters.
    pub fn instance(&self) -> &Data {
        &self.instance
    }

    /// Returns the parameters shared by all instances of this check.
    pub fn init_config(&self) -> &Data {
        &self.init_config
    }

    /// Returns where this configuration came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Derives the identity of the check instance this configuration describes.
    pub fn id(&self) -> CheckId {
        CheckId::derive(&self.name, &self.instance)
    }

    /// Resolves the execution interval of this check instance.
    ///
    /// `min_collection_interval` (in seconds) is looked up in the instance parameters first, then in `init_config`.
    /// Missing values fall back to [`DEFAULT_CHECK_INTERVAL`], as do values that are not a positive number (with a
    /// warning). Values above [`MAX_CHECK_INTERVAL`] are capped.
    pub fn interval(&self) -> Duration {
        let value = self
            .instance
            .get(MIN_COLLECTION_INTERVAL_KEY)
            .or_else(|| self.init_config.get(MIN_COLLECTION_INTERVAL_KEY));

        let Some(value) = value else {
            return DEFAULT_CHECK_INTERVAL;
        };

        match value.as_f64().filter(|secs| secs.is_finite() && *secs > 0.0) {
            Some(secs) if secs > MAX_CHECK_INTERVAL.as_secs_f64() => {
                warn!(
                    check.name = %self.name,
                    value = secs,
                    max_secs = MAX_CHECK_INTERVAL.as_secs(),
                    "`min_collection_interval` is too long. Using maximum interval."
                );
                MAX_CHECK_INTERVAL
            }
            Some(secs) => Duration::from_secs_f64(secs),
            None => {
                warn!(
                    check.name = %self.name,
                    value = ?value,
                    default_secs = DEFAULT_CHECK_INTERVAL.as_secs(),
                    "Invalid `min_collection_interval`. Using default interval."
                );
                DEFAULT_CHECK_INTERVAL
            }
        }
    }
}

impl fmt::Display for CheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (source: {})", self.name, self.source)
    }
}
