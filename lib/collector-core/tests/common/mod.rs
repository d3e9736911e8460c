#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use collector_core::prelude::*;
use collector_error::{generic_error, GenericError};

#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
    Sleep(Duration),
}

pub struct MockCheck {
    metadata: CheckMetadata,
    label: String,
    behavior: Behavior,
    describe_panics: bool,
    runs: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCheck {
    pub fn from_config(config: &CheckConfig, label: &str, behavior: Behavior) -> Self {
        Self {
            metadata: CheckMetadata::from_config(config),
            label: label.to_string(),
            behavior,
            describe_panics: false,
            runs: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn new(name: &str, interval_secs: u64, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self::from_config(&check_config(name, interval_secs), name, behavior))
    }

    /// Makes `describe` panic.
    pub fn with_panicking_describe(mut self) -> Self {
        self.describe_panics = true;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Check for MockCheck {
    fn id(&self) -> &CheckId {
        self.metadata.id()
    }

    fn interval(&self) -> Duration {
        self.metadata.interval()
    }

    async fn run(&self) -> Result<Vec<Submission>, GenericError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let result = match self.behavior {
            Behavior::Succeed => Ok(vec![Submission::gauge("mock.value", 1.0)]),
            Behavior::Fail => Err(generic_error!("mock check failure")),
            Behavior::Panic => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("mock check panic");
            }
            Behavior::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Vec::new())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn describe(&self) -> String {
        if self.describe_panics {
            panic!("mock describe panic");
        }
        self.label.clone()
    }
}

/// Loads `MockCheck`s for a fixed set of check names.
pub struct MockLoader {
    name: String,
    kinds: Vec<String>,
    behavior: Behavior,
}

impl MockLoader {
    pub fn new(name: &str, kinds: &[&str], behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            kinds: kinds.iter().map(|kind| kind.to_string()).collect(),
            behavior,
        }
    }
}

impl CheckLoader for MockLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, config: &CheckConfig) -> Result<Arc<dyn Check>, LoadError> {
        if !self.kinds.iter().any(|kind| kind == config.name()) {
            return Err(LoadError::UnknownCheck {
                name: config.name().to_string(),
            });
        }
        Ok(Arc::new(MockCheck::from_config(config, &self.name, self.behavior)))
    }
}

pub fn check_config(name: &str, interval_secs: u64) -> CheckConfig {
    let instance = [("min_collection_interval", interval_secs)].into_iter().collect::<Data>();
    CheckConfig::new(name, instance, Data::default()).with_source("test")
}
