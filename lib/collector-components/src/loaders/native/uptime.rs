use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use collector_core::{
    check::{Check, CheckId, CheckMetadata, Submission},
    config::CheckConfig,
    loader::LoadError,
};
use collector_error::GenericError;

use super::LoaderContext;

/// Reports how long the collector has been running, in seconds.
pub struct UptimeCheck {
    metadata: CheckMetadata,
    started: Instant,
    tags: Vec<String>,
}

impl UptimeCheck {
    pub fn build(config: &CheckConfig, context: &LoaderContext) -> Result<Arc<dyn Check>, LoadError> {
        let tags = match config.instance().get("tags") {
            None => Vec::new(),
            Some(value) => serde_yaml::from_value(value.clone()).map_err(|e| LoadError::InvalidConfiguration {
                name: config.name().to_string(),
                reason: format!("`tags` must be a list of strings: {}", e),
            })?,
        };

        Ok(Arc::new(Self {
            metadata: CheckMetadata::from_config(config),
            started: context.started(),
            tags,
        }))
    }
}

#[async_trait]
impl Check for UptimeCheck {
    fn id(&self) -> &CheckId {
        self.metadata.id()
    }

    fn interval(&self) -> Duration {
        self.metadata.interval()
    }

    async fn run(&self) -> Result<Vec<Submission>, GenericError> {
        let uptime = Submission::gauge("collector.uptime", self.started.elapsed().as_secs_f64());
        Ok(vec![self.tags.iter().fold(uptime, |submission, tag| submission.with_tag(tag.as_str()))])
    }

    fn describe(&self) -> String {
        self.metadata.describe()
    }
}
