use std::path::{Path, PathBuf};

use async_trait::async_trait;
use collector_core::{
    config::{CheckConfig, Data},
    provider::{ConfigProvider, ProviderError},
};
use collector_error::{generic_error, GenericError};
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, warn};

const PROVIDER_NAME: &str = "file";

/// A check configuration file.
///
/// `init_config` is shared by every instance, and each entry of `instances` becomes one check.
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    init_config: Option<Data>,

    #[serde(default)]
    instances: Option<Vec<Data>>,
}

/// A config provider that reads check configurations from the file system.
///
/// Each search directory is scanned for `<name>.yaml` (or `.yml`) files, and for `<name>.d` directories holding any
/// number of YAML files, where `<name>` is the name of the check to load. Files are read in path order.
pub struct FileConfigProvider {
    search_paths: Vec<PathBuf>,
}

impl FileConfigProvider {
    /// Creates a new `FileConfigProvider` scanning the given directories.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Self {
        Self {
            search_paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn collect(&self) -> Result<Vec<CheckConfig>, ProviderError> {
        let mut candidates = Vec::new();
        let mut readable = 0;

        for path in &self.search_paths {
            match find_config_files(path).await {
                Ok(found) => {
                    readable += 1;
                    candidates.extend(found);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable configuration directory."),
            }
        }

        if readable == 0 && !self.search_paths.is_empty() {
            return Err(ProviderError::Unreachable {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("none of the {} search path(s) could be read", self.search_paths.len()),
            });
        }

        candidates.sort();

        let mut configs = Vec::new();
        let mut malformed = 0;
        for (path, check_name) in &candidates {
            match parse_config_file(path, check_name).await {
                Ok(parsed) => {
                    if parsed.is_empty() {
                        debug!(path = %path.display(), "Configuration file has no instances.");
                    }
                    configs.extend(parsed);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed configuration file.");
                    malformed += 1;
                }
            }
        }

        if malformed > 0 && malformed == candidates.len() {
            return Err(ProviderError::Malformed {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("all {} configuration file(s) are malformed", malformed),
            });
        }

        Ok(configs)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml" | "yml"))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|stem| stem.to_str()).map(String::from)
}

/// Finds every configuration file under `dir`, paired with the name of the check it configures.
async fn find_config_files(dir: &Path) -> Result<Vec<(PathBuf, String)>, GenericError> {
    let mut found = Vec::new();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;

        if file_type.is_dir() {
            let Some(check_name) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".d"))
                .filter(|name| !name.is_empty())
                .map(String::from)
            else {
                continue;
            };

            match fs::read_dir(&path).await {
                Ok(mut nested) => {
                    while let Some(nested_entry) = nested.next_entry().await? {
                        let nested_path = nested_entry.path();
                        if is_yaml(&nested_path) {
                            found.push((nested_path, check_name.clone()));
                        }
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable check directory."),
            }
        } else if is_yaml(&path) {
            if let Some(check_name) = file_stem(&path) {
                found.push((path, check_name));
            }
        }
    }

    Ok(found)
}

/// Parses one configuration file into a check configuration per instance.
async fn parse_config_file(path: &Path, check_name: &str) -> Result<Vec<CheckConfig>, GenericError> {
    let contents = fs::read_to_string(path).await?;
    let file: ConfigFile = serde_yaml::from_str(&contents)
        .map_err(|e| generic_error!("Failed to parse '{}': {}", path.display(), e))?;

    let init_config = file.init_config.unwrap_or_default();
    let source = path.display().to_string();

    Ok(file
        .instances
        .unwrap_or_default()
        .into_iter()
        .map(|instance| CheckConfig::new(check_name, instance, init_config.clone()).with_source(source.clone()))
        .collect())
}
