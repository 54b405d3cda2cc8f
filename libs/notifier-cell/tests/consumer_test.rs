use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::eq;
use tokio::sync::watch;
use uuid::Uuid;

use notifier_cell::*;
use shared_database::{DatabaseError, DeliveryLogStore, InMemoryStore};
use shared_models::{AlertChannel, AlertEvent, DeliveryLog, DeliveryStatus};
use shared_queue::{DeadLetter, InMemoryBroker, JobQueue, QueueNames};
use shared_utils::test_utils::TestAlert;

mock! {
    pub Channel {}

    #[async_trait]
    impl DeliveryChannel for Channel {
        fn channel(&self) -> AlertChannel;
        async fn deliver(&self, target: &str, message: &str) -> Result<(), ChannelError>;
    }
}

struct BrokenLogStore;

#[async_trait]
impl DeliveryLogStore for BrokenLogStore {
    async fn insert_delivery_log(&self, _log: &DeliveryLog) -> Result<(), DatabaseError> {
        Err(DatabaseError::Api {
            status: 500,
            message: "delivery_logs unavailable".to_string(),
        })
    }

    async fn delivery_logs_for_alert(&self, _alert_id: Uuid) -> Result<Vec<DeliveryLog>, DatabaseError> {
        Ok(Vec::new())
    }
}

struct Harness {
    broker: Arc<InMemoryBroker>,
    queue: Arc<JobQueue>,
    names: QueueNames,
    store: Arc<InMemoryStore>,
}

fn harness() -> Harness {
    let broker = Arc::new(InMemoryBroker::new());
    let names = QueueNames::with_prefix("notify");
    let queue = Arc::new(JobQueue::new(broker.clone(), names.clone()));
    Harness {
        broker,
        queue,
        names,
        store: Arc::new(InMemoryStore::new()),
    }
}

fn failing_email_channel(times: usize) -> MockChannel {
    let mut channel = MockChannel::new();
    channel.expect_channel().return_const(AlertChannel::Email);
    channel
        .expect_deliver()
        .times(times)
        .returning(|_, _| Err(ChannelError::Email("Failed to send email: connection refused".to_string())));
    channel
}

fn consumer(h: &Harness, channels: ChannelRegistry) -> NotifierConsumerService {
    NotifierConsumerService::new(
        NotifierConfig {
            concurrency: 2,
            promote_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
            ..NotifierConfig::default()
        },
        h.queue.clone(),
        channels,
        DeliveryLogService::new(h.store.clone()),
    )
}

#[tokio::test]
async fn test_successful_delivery_is_logged() {
    let h = harness();
    let event = TestAlert::email("ops@example.com");

    let mut channel = MockChannel::new();
    channel.expect_channel().return_const(AlertChannel::Email);
    channel
        .expect_deliver()
        .with(eq("ops@example.com"), eq("ALERT: https://down.example is DOWN"))
        .times(1)
        .returning(|_, _| Ok(()));

    let consumer = consumer(&h, ChannelRegistry::new().with(Arc::new(channel)));
    let outcome = consumer.process_event(event.clone()).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    let logs = h.store.delivery_logs_for_alert(event.alert_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, DeliveryStatus::Success);
    assert_eq!(logs[0].attempt, 1);
    assert!(h.broker.pending_delays(&h.names.alerts).is_empty());
}

#[tokio::test]
async fn test_failure_schedules_backed_off_retry() {
    let h = harness();
    let event = TestAlert::email("ops@example.com");
    let consumer = consumer(&h, ChannelRegistry::new().with(Arc::new(failing_email_channel(1))));

    let outcome = consumer.process_event(event.clone()).await;

    assert_eq!(
        outcome,
        DeliveryOutcome::RetryScheduled { next_attempt: 2, delay: Duration::from_secs(10) }
    );
    assert_eq!(h.broker.pending_delays(&h.names.alerts), vec![Duration::from_secs(10)]);
    // Delayed, not visible yet.
    assert!(h.broker.snapshot(&h.names.alerts).is_empty());

    let logs = h.store.delivery_logs_for_alert(event.alert_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, DeliveryStatus::Failed);
    assert!(logs[0].error.as_deref().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_five_failures_exhaust_and_dead_letter() {
    let h = harness();
    let event = TestAlert::email("ops@example.com");
    let consumer = consumer(&h, ChannelRegistry::new().with(Arc::new(failing_email_channel(5))));

    let mut delays = Vec::new();
    let mut current = event.clone();
    let mut last_outcome = None;

    for _ in 0..5 {
        last_outcome = Some(consumer.process_event(current).await);

        delays.extend(h.broker.pending_delays(&h.names.alerts));
        if h.broker.release_delayed(&h.names.alerts) == 0 {
            break;
        }
        current = h.queue.pop_alert().await.unwrap();
    }

    assert_matches!(last_outcome, Some(DeliveryOutcome::DeadLettered { .. }));
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(10_000),
            Duration::from_millis(20_000),
            Duration::from_millis(40_000),
            Duration::from_millis(80_000),
        ]
    );

    let logs = h.store.delivery_logs_for_alert(event.alert_id).await.unwrap();
    assert_eq!(logs.len(), 5);
    assert!(logs.iter().all(|log| log.status == DeliveryStatus::Failed));
    let attempts: Vec<u32> = logs.iter().map(|log| log.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);

    // No sixth attempt is ever queued.
    assert!(h.broker.pending_delays(&h.names.alerts).is_empty());
    assert!(h.broker.snapshot(&h.names.alerts).is_empty());

    let dead = h.broker.snapshot(&h.names.alerts_dead);
    assert_eq!(dead.len(), 1);
    let letter: DeadLetter<AlertEvent> = serde_json::from_str(&dead[0]).unwrap();
    assert_eq!(letter.payload.alert_id, event.alert_id);
    assert_eq!(letter.payload.attempt, 5);
}

#[tokio::test]
async fn test_dead_lettered_alert_can_be_replayed() {
    let h = harness();
    let mut event = TestAlert::email("ops@example.com");
    event.attempt = 5;
    let consumer = consumer(&h, ChannelRegistry::new().with(Arc::new(failing_email_channel(1))));

    assert_matches!(consumer.process_event(event.clone()).await, DeliveryOutcome::DeadLettered { .. });

    assert_eq!(h.queue.replay_dead_alerts(10).await.unwrap(), 1);
    let replayed = h.queue.pop_alert().await.unwrap();
    assert_eq!(replayed.alert_id, event.alert_id);
    assert_eq!(replayed.attempt, 1);
}

#[tokio::test]
async fn test_unregistered_channel_counts_as_failure() {
    let h = harness();
    let event = TestAlert::webhook("https://hooks.example/ops");
    let consumer = consumer(&h, ChannelRegistry::new());

    let outcome = consumer.process_event(event.clone()).await;

    assert_matches!(outcome, DeliveryOutcome::RetryScheduled { next_attempt: 2, .. });
    let logs = h.store.delivery_logs_for_alert(event.alert_id).await.unwrap();
    assert!(logs[0].error.as_deref().unwrap().contains("No delivery channel registered for webhook"));
}

#[tokio::test]
async fn test_delivery_log_failure_is_swallowed() {
    let h = harness();
    let mut channel = MockChannel::new();
    channel.expect_channel().return_const(AlertChannel::Email);
    channel.expect_deliver().times(1).returning(|_, _| Ok(()));

    let consumer = NotifierConsumerService::new(
        NotifierConfig::default(),
        h.queue.clone(),
        ChannelRegistry::new().with(Arc::new(channel)),
        DeliveryLogService::new(Arc::new(BrokenLogStore)),
    );

    let outcome = consumer.process_event(TestAlert::email("ops@example.com")).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered);
}

#[tokio::test]
async fn test_run_delivers_queued_alerts_until_shutdown() {
    let h = harness();
    let event = TestAlert::email("ops@example.com");
    h.queue.push_alert(&event).await.unwrap();

    let mut channel = MockChannel::new();
    channel.expect_channel().return_const(AlertChannel::Email);
    channel.expect_deliver().times(1).returning(|_, _| Ok(()));

    let consumer = Arc::new(consumer(&h, ChannelRegistry::new().with(Arc::new(channel))));
    let (tx, rx) = watch::channel(false);
    let running = tokio::spawn(consumer.clone().run(rx));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.store.delivery_logs_for_alert(event.alert_id).await.unwrap().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "alert was not delivered in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), running).await.unwrap().unwrap();
}
