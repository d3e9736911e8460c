use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use collector_core::{
    check::{Check, CheckId, CheckMetadata, ServiceCheck, ServiceCheckStatus, Submission},
    config::CheckConfig,
    loader::LoadError,
};
use collector_error::GenericError;
use serde::Deserialize;
use tokio::{
    net::TcpStream,
    time::{timeout, Instant},
};
use tracing::debug;

use super::{parse_instance, LoaderContext};

const SERVICE_CHECK_NAME: &str = "tcp.can_connect";
const RESPONSE_TIME_METRIC: &str = "network.tcp.response_time";

const fn default_timeout_secs() -> f64 {
    10.0
}

#[derive(Deserialize)]
struct TcpInstance {
    host: String,
    port: u16,

    #[serde(default = "default_timeout_secs")]
    timeout: f64,

    #[serde(default)]
    tags: Vec<String>,
}

const NO_STATUS: u8 = u8::MAX;

/// Checks whether a TCP endpoint accepts connections.
///
/// Reports the connection time as `network.tcp.response_time` (in seconds) and the outcome as the `tcp.can_connect`
/// service check, which is CRITICAL when the connection fails or times out. When the endpoint goes up or down between
/// two runs, an event is reported as well.
pub struct TcpCheck {
    metadata: CheckMetadata,
    host: String,
    port: u16,
    timeout: Duration,
    tags: Vec<String>,
    last_status: AtomicU8,
}

impl TcpCheck {
    pub fn build(config: &CheckConfig, _context: &LoaderContext) -> Result<Arc<dyn Check>, LoadError> {
        let instance: TcpInstance = parse_instance(config)?;
        let timeout = Duration::try_from_secs_f64(instance.timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| LoadError::InvalidConfiguration {
                name: config.name().to_string(),
                reason: format!("`timeout` must be a positive number of seconds, got {}", instance.timeout),
            })?;

        let mut tags = instance.tags;
        tags.push(format!("target_host:{}", instance.host));
        tags.push(format!("port:{}", instance.port));

        Ok(Arc::new(Self {
            metadata: CheckMetadata::from_config(config),
            host: instance.host,
            port: instance.port,
            timeout,
            tags,
            last_status: AtomicU8::new(NO_STATUS),
        }))
    }

    fn tagged(&self, submission: Submission) -> Submission {
        self.tags
            .iter()
            .fold(submission, |submission, tag| submission.with_tag(tag.as_str()))
    }

    /// Returns an event if the endpoint status differs from the one seen on the previous run.
    fn status_change(&self, status: ServiceCheckStatus) -> Option<Submission> {
        let previous = self.last_status.swap(status as u8, Ordering::Relaxed);
        if previous == NO_STATUS || previous == status as u8 {
            return None;
        }

        let (state, text) = match status {
            ServiceCheckStatus::Ok => ("up", "Connections are accepted again."),
            _ => ("down", "Connections are no longer accepted."),
        };
        let title = format!("{}:{} is {}", self.host, self.port, state);
        Some(self.tagged(Submission::event(title, text)))
    }

    fn service_check(&self, status: ServiceCheckStatus, message: Option<String>) -> Submission {
        self.tagged(Submission::ServiceCheck(ServiceCheck {
            name: SERVICE_CHECK_NAME.to_string(),
            status,
            message,
            tags: Vec::new(),
        }))
    }
}

#[async_trait]
impl Check for TcpCheck {
    fn id(&self) -> &CheckId {
        self.metadata.id()
    }

    fn interval(&self) -> Duration {
        self.metadata.interval()
    }

    async fn run(&self) -> Result<Vec<Submission>, GenericError> {
        let start = Instant::now();
        let result = timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port))).await;
        let elapsed = start.elapsed();

        let (status, mut submissions) = match result {
            Ok(Ok(_stream)) => (
                ServiceCheckStatus::Ok,
                vec![
                    self.tagged(Submission::gauge(RESPONSE_TIME_METRIC, elapsed.as_secs_f64())),
                    self.service_check(ServiceCheckStatus::Ok, None),
                ],
            ),
            Ok(Err(e)) => {
                debug!(check.id = %self.id(), error = %e, "Connection failed.");
                let message = format!("Failed to connect to {}:{}: {}", self.host, self.port, e);
                (
                    ServiceCheckStatus::Critical,
                    vec![self.service_check(ServiceCheckStatus::Critical, Some(message))],
                )
            }
            Err(_) => {
                let message = format!(
                    "Connection to {}:{} timed out after {:?}",
                    self.host, self.port, self.timeout
                );
                (
                    ServiceCheckStatus::Critical,
                    vec![self.service_check(ServiceCheckStatus::Critical, Some(message))],
                )
            }
        };

        submissions.extend(self.status_change(status));
        Ok(submissions)
    }

    fn describe(&self) -> String {
        format!("{} ({}:{})", self.metadata.describe(), self.host, self.port)
    }
}
