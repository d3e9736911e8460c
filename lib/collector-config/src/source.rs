use std::path::Path;

use figment::{
    providers::{Data, Yaml},
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};

/// A YAML configuration file whose data has been read and parsed up front.
///
/// Reading eagerly means a missing or malformed file is reported when it is added to the loader, rather than being
/// silently treated as empty when the configuration is first queried.
pub(crate) struct YamlFileSource {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl YamlFileSource {
    pub fn read<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;

        Ok(Self {
            data: Data::<Yaml>::string(&contents).data()?,
            metadata: Metadata::from("YAML file", path),
        })
    }
}

impl Provider for YamlFileSource {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}
