use std::fmt;

/// Something produced by a successful check run.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// A metric sample.
    Metric(MetricSample),

    /// An event.
    Event(Event),

    /// A service check status.
    ServiceCheck(ServiceCheck),
}

impl Submission {
    /// Creates a gauge metric submission.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::Metric(MetricSample {
            name: name.into(),
            value,
            tags: Vec::new(),
        })
    }

    /// Creates an event submission.
    pub fn event(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Event(Event {
            title: title.into(),
            text: text.into(),
            tags: Vec::new(),
        })
    }

    /// Creates a service check submission.
    pub fn service_check(name: impl Into<String>, status: ServiceCheckStatus) -> Self {
        Self::ServiceCheck(ServiceCheck {
            name: name.into(),
            status,
            message: None,
            tags: Vec::new(),
        })
    }

    /// Adds a tag to this submission.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        match &mut self {
            Self::Metric(metric) => metric.tags.push(tag),
            Self::Event(event) => event.tags.push(tag),
            Self::ServiceCheck(service_check) => service_check.tags.push(tag),
        }
        self
    }
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric(metric) => write!(f, "metric {}={}", metric.name, metric.value),
            Self::Event(event) => write!(f, "event \"{}\"", event.title),
            Self::ServiceCheck(service_check) => {
                write!(f, "service check {} ({:?})", service_check.name, service_check.status)
            }
        }
    }
}

/// A metric sample.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricSample {
    /// Metric name.
    pub name: String,

    /// Sampled value.
    pub value: f64,

    /// Tags, in `key:value` form.
    pub tags: Vec<String>,
}

/// An event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Event title.
    pub title: String,

    /// Event body.
    pub text: String,

    /// Tags, in `key:value` form.
    pub tags: Vec<String>,
}

/// Status of a service check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceCheckStatus {
    /// The service is healthy.
    Ok = 0,

    /// The service is degraded.
    Warning = 1,

    /// The service is down.
    Critical = 2,

    /// The service status could not be determined.
    Unknown = 3,
}

/// A service check.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceCheck {
    /// Service check name.
    pub name: String,

    /// Reported status.
    pub status: ServiceCheckStatus,

    /// Optional status message.
    pub message: Option<String>,

    /// Tags, in `key:value` form.
    pub tags: Vec<String>,
}
