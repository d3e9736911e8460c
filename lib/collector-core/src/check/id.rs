use std::{fmt, hash::Hasher as _, sync::Arc};

use fnv::FnvHasher;
use twox_hash::XxHash64;

use crate::config::Data;

/// Identity of a check instance.
///
/// Derived deterministically from the check name and its instance parameters, so the same configuration always maps
/// to the same identity across restarts. `init_config` does not participate: two instances with identical parameters
/// are the same check even if they were declared with different shared settings.
///
/// Rendered as `<name>:<instance name>:<HASH>` when the instance has a `name` (or `namespace`) parameter, and as
/// `<name>:<HASH>` otherwise.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CheckId(Arc<str>);

impl CheckId {
    /// Derives the identity of the check instance with the given name and instance parameters.
    pub fn derive(name: &str, instance: &Data) -> Self {
        let mut name_hasher = XxHash64::with_seed(0);
        name_hasher.write(name.as_bytes());
        let name_digest = name_hasher.finish();

        let mut hasher = FnvHasher::default();
        hasher.write_u64(name_digest);
        hasher.write(&instance.to_canonical_bytes());
        let digest = hasher.finish();

        let id = match instance_name(instance) {
            Some(instance_name) => format!("{}:{}:{:X}", name, instance_name, digest),
            None => format!("{}:{:X}", name, digest),
        };

        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

fn instance_name(instance: &Data) -> Option<&str> {
    instance
        .get_str("name")
        .or_else(|| instance.get_str("namespace"))
        .filter(|name| !name.is_empty())
}
