use std::{sync::Arc, time::Duration};

use collector_core::{
    prelude::*,
    provider::StaticConfigProvider,
    scheduler::{work_queue, Scheduler},
};
use tokio::time::Instant;

mod common;
use self::common::{check_config, Behavior, MockCheck, MockLoader};

fn fast_config() -> CollectorConfiguration {
    CollectorConfiguration::default().with_tick_interval(Duration::from_millis(100))
}

#[tokio::test(start_paused = true)]
async fn providers_are_concatenated_and_checks_due_at_registration() {
    let (sink, mut outcomes) = ChannelSink::new(16);
    let collector = CollectorBuilder::new(fast_config().with_runners(2))
        .with_provider(StaticConfigProvider::new("a", vec![check_config("disk", 10)]))
        .with_provider(StaticConfigProvider::new("b", vec![check_config("http", 5)]))
        .with_loader(MockLoader::new("native", &["disk", "http"], Behavior::Succeed))
        .with_sink(sink)
        .build()
        .await
        .unwrap();

    let summary = collector.summary();
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.scheduled, 2);
    assert!(collector.is_scheduled(&check_config("disk", 10).id()));
    assert!(collector.is_scheduled(&check_config("http", 5).id()));

    let start = Instant::now();
    let running = collector.spawn();

    let mut names = Vec::new();
    for _ in 0..2 {
        let outcome = outcomes.recv().await.unwrap();
        assert!(outcome.is_success());
        names.push(outcome.check_id.as_str().split(':').next().unwrap().to_string());
    }
    names.sort();
    assert_eq!(names, vec!["disk", "http"]);
    assert!(start.elapsed() < Duration::from_secs(1));

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn first_loader_that_succeeds_is_used() {
    let (sink, mut outcomes) = ChannelSink::new(16);
    let collector = CollectorBuilder::new(fast_config())
        .with_provider(StaticConfigProvider::new("a", vec![check_config("http", 5)]))
        .with_loader(MockLoader::new("l1", &["disk"], Behavior::Succeed))
        .with_loader(MockLoader::new("l2", &["http"], Behavior::Succeed))
        .with_loader(MockLoader::new("l3", &["http"], Behavior::Succeed))
        .with_sink(sink)
        .build()
        .await
        .unwrap();
    assert_eq!(collector.summary().scheduled, 1);

    let running = collector.spawn();
    let outcome = outcomes.recv().await.unwrap();
    assert_eq!(outcome.description, "l2");

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unresolvable_config_is_dropped() {
    let collector = CollectorBuilder::new(fast_config())
        .with_provider(StaticConfigProvider::new(
            "a",
            vec![check_config("http", 5), check_config("redis", 5)],
        ))
        .with_loader(MockLoader::new("l1", &["http"], Behavior::Succeed))
        .build()
        .await
        .unwrap();

    let summary = collector.summary();
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.unresolved, 1);
    assert!(!collector.is_scheduled(&check_config("redis", 5).id()));
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_occurrence_until_next_interval() {
    let (work_tx, mut work_rx) = work_queue(1);
    let mut scheduler = Scheduler::new(work_tx);

    let disk = MockCheck::new("disk", 10, Behavior::Succeed);
    let http = MockCheck::new("http", 10, Behavior::Succeed);
    let start = Instant::now();
    scheduler.register_at(disk.clone(), start);
    scheduler.register_at(http.clone(), start);

    let summary = scheduler.tick(start);
    assert_eq!(summary.due, 2);
    assert_eq!(summary.enqueued, 1);
    assert_eq!(summary.dropped, 1);

    // Both checks advanced, whether or not they made it onto the queue.
    let next = start + Duration::from_secs(10);
    assert_eq!(scheduler.next_due(disk.id()), Some(next));
    assert_eq!(scheduler.next_due(http.id()), Some(next));
    let first = work_rx.try_recv().unwrap().id;

    assert_eq!(scheduler.tick(start + Duration::from_secs(9)).due, 0);

    let summary = scheduler.tick(next);
    assert_eq!(summary.due, 2);
    assert_eq!(summary.enqueued, 1);
    assert_eq!(summary.dropped, 1);
    assert_eq!(work_rx.try_recv().unwrap().id, first);
}

#[tokio::test(start_paused = true)]
async fn failing_check_stays_scheduled() {
    let (sink, mut outcomes) = ChannelSink::new(16);
    let collector = CollectorBuilder::new(fast_config())
        .with_provider(StaticConfigProvider::new("a", vec![check_config("disk", 10)]))
        .with_loader(MockLoader::new("native", &["disk"], Behavior::Fail))
        .with_sink(sink)
        .build()
        .await
        .unwrap();

    let start = Instant::now();
    let running = collector.spawn();

    for expected_secs in [0, 10, 20] {
        let outcome = outcomes.recv().await.unwrap();
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.detail, "mock check failure");

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(expected_secs), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(expected_secs + 1), "{:?}", elapsed);
    }

    // Still registered: the next interval produces another run.
    let outcome = outcomes.recv().await.unwrap();
    assert!(!outcome.is_success());

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn later_registration_replaces_earlier() {
    let collector = CollectorBuilder::new(fast_config())
        .with_provider(StaticConfigProvider::new("a", vec![check_config("disk", 10)]))
        .with_provider(StaticConfigProvider::new("b", vec![check_config("disk", 10)]))
        .with_loader(MockLoader::new("native", &["disk"], Behavior::Succeed))
        .build()
        .await
        .unwrap();

    let summary = collector.summary();
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.replaced, 1);
    assert_eq!(summary.scheduled, 1);
}

#[tokio::test(start_paused = true)]
async fn most_recent_registration_is_the_one_that_runs() {
    let (sink, mut outcomes) = ChannelSink::new(16);
    let mut collector = CollectorBuilder::new(fast_config())
        .with_sink(sink)
        .build()
        .await
        .unwrap();

    let config = check_config("disk", 10);
    let first = Arc::new(MockCheck::from_config(&config, "first", Behavior::Succeed));
    let second = Arc::new(MockCheck::from_config(&config, "second", Behavior::Succeed));
    assert_eq!(first.id(), second.id());

    assert!(collector.register(first.clone()).is_none());
    let replaced = collector.register(second.clone()).unwrap();
    assert_eq!(replaced.describe(), "first");
    assert_eq!(collector.scheduled(), 1);

    let running = collector.spawn();
    for _ in 0..2 {
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.description, "second");
    }
    assert_eq!(first.runs(), 0);
    assert_eq!(second.runs(), 2);

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_loaders_after_tasks() {
    struct TrackingLoader(Arc<std::sync::atomic::AtomicBool>);

    impl CheckLoader for TrackingLoader {
        fn name(&self) -> &str {
            "tracking"
        }

        fn load(&self, config: &CheckConfig) -> Result<Arc<dyn Check>, LoadError> {
            Err(LoadError::UnknownCheck {
                name: config.name().to_string(),
            })
        }

        fn shutdown(&self) {
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let collector = CollectorBuilder::new(fast_config())
        .with_loader(TrackingLoader(Arc::clone(&stopped)))
        .build()
        .await
        .unwrap();

    let running = collector.spawn();
    assert!(!stopped.load(std::sync::atomic::Ordering::SeqCst));
    running.shutdown().await;
    assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let result = CollectorBuilder::new(CollectorConfiguration::default().with_queue_capacity(0))
        .build()
        .await;
    assert!(result.is_err());
}
