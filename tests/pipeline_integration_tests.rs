use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use check_cell::{AlertTargets, CheckWorkerService, IncidentAction, JobOutcome, WorkerConfig};
use notifier_cell::{
    ChannelRegistry, DeliveryLogService, DeliveryOutcome, NotifierConfig, NotifierConsumerService,
    WebhookChannel,
};
use scheduler_cell::{MonitorSource, SchedulerConfig, SchedulerService};
use shared_database::{DeliveryLogStore, InMemoryStore, MonitorStore};
use shared_models::{AlertEvent, AlertKind, DeliveryStatus, MonitorStatus};
use shared_queue::{InMemoryBroker, JobQueue, QueueNames};
use shared_utils::test_utils::{TestConfig, TestMonitor};
use shared_utils::RetryPolicy;

struct Pipeline {
    broker: Arc<InMemoryBroker>,
    queue: Arc<JobQueue>,
    names: QueueNames,
    store: Arc<InMemoryStore>,
    scheduler: Arc<SchedulerService>,
    worker: Arc<CheckWorkerService>,
    notifier: Arc<NotifierConsumerService>,
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        retries: 3,
        base_delay: Duration::from_millis(1),
    }
}

fn pipeline(store: Arc<InMemoryStore>) -> Pipeline {
    let test_config = TestConfig::default();
    let broker = Arc::new(InMemoryBroker::new());
    let names = QueueNames::with_prefix(&test_config.queue_prefix);
    let queue = Arc::new(JobQueue::new(broker.clone(), names.clone()));

    let scheduler = Arc::new(SchedulerService::new(
        SchedulerConfig {
            tick_interval: Duration::from_millis(20),
            stats_interval: Duration::from_secs(30),
            push_retry: fast_retry(),
        },
        queue.clone(),
        MonitorSource::Store(store.clone()),
    ));

    let worker = Arc::new(CheckWorkerService::new(
        WorkerConfig {
            persist_retry: fast_retry(),
            error_backoff: Duration::from_millis(10),
            ..WorkerConfig::from_app_config(&test_config.to_app_config())
        },
        queue.clone(),
        store.clone(),
        AlertTargets::default(),
    ));

    let notifier = Arc::new(NotifierConsumerService::new(
        NotifierConfig {
            promote_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
            ..NotifierConfig::from_app_config(&test_config.to_app_config())
        },
        queue.clone(),
        ChannelRegistry::new().with(Arc::new(WebhookChannel::new(Duration::from_secs(2)))),
        DeliveryLogService::new(store.clone()),
    ));

    Pipeline {
        broker,
        queue,
        names,
        store,
        scheduler,
        worker,
        notifier,
    }
}

/// Target answers 200, then 500, then 200 forever. The webhook rejects its
/// first delivery and accepts the rest.
async fn flapping_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    server
}

impl Pipeline {
    async fn tick_and_check(&self) -> JobOutcome {
        let report = self.scheduler.run_tick().await.unwrap();
        assert_eq!(report.enqueued, 1);
        let job = self.queue.pop_check_job().await.unwrap();
        self.worker.process_job(job).await.unwrap()
    }

    /// Delivers the next alert, releasing any parked retry first.
    async fn deliver_next(&self) -> (AlertEvent, DeliveryOutcome) {
        self.broker.release_delayed(&self.names.alerts);
        let event = self.queue.pop_alert().await.unwrap();
        let outcome = self.notifier.process_event(event.clone()).await;
        (event, outcome)
    }
}

#[tokio::test]
async fn test_outage_and_recovery_flow_end_to_end() {
    let server = flapping_server().await;
    let store = Arc::new(InMemoryStore::new());
    let mut monitor = TestMonitor::with_webhook(
        format!("{}/svc", server.uri()),
        format!("{}/hook", server.uri()),
    );
    monitor.interval_seconds = 0;
    store.insert_monitor(monitor.clone()).await;
    let p = pipeline(store);

    // 1. First check: up, nothing to compare with.
    assert_matches!(p.tick_and_check().await, JobOutcome::Processed(ref r) if r.action == IncidentAction::NoAction);

    // 2. Target starts failing: incident opened, alert queued.
    assert_matches!(p.tick_and_check().await, JobOutcome::Processed(ref r) => {
        assert_matches!(r.action, IncidentAction::Created(_));
        assert_eq!(r.alerts_enqueued, 1);
    });
    assert_eq!(p.store.incidents_for(monitor.id).await.len(), 1);

    // 3. Webhook rejects the first delivery, accepts the retry.
    let (opened, outcome) = p.deliver_next().await;
    assert_eq!(opened.kind, AlertKind::IncidentOpened);
    assert_matches!(outcome, DeliveryOutcome::RetryScheduled { next_attempt: 2, .. });
    let (retried, outcome) = p.deliver_next().await;
    assert_eq!(retried.alert_id, opened.alert_id);
    assert_eq!(outcome, DeliveryOutcome::Delivered);

    // 4. Target recovers: incident resolved, recovery alert delivered.
    assert_matches!(p.tick_and_check().await, JobOutcome::Processed(ref r) => {
        assert_matches!(r.action, IncidentAction::Resolved(_));
    });
    let (recovered, outcome) = p.deliver_next().await;
    assert_eq!(recovered.kind, AlertKind::IncidentResolved);
    assert!(recovered.message.starts_with("RECOVERED: "));
    assert_eq!(outcome, DeliveryOutcome::Delivered);

    let logs = p.store.delivery_logs_for_alert(opened.alert_id).await.unwrap();
    let trail: Vec<(DeliveryStatus, u32)> = logs.iter().map(|log| (log.status, log.attempt)).collect();
    assert_eq!(trail, vec![(DeliveryStatus::Failed, 1), (DeliveryStatus::Success, 2)]);

    let incidents = p.store.incidents_for(monitor.id).await;
    assert_eq!(incidents.len(), 1);
    assert!(!incidents[0].is_open());

    let stored = p.store.get_monitor(monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MonitorStatus::Up);
    assert_eq!(p.store.recent_check_results(monitor.id, 10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_running_services_open_incident_and_alert() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let mut monitor = TestMonitor::with_webhook(
        format!("{}/svc", server.uri()),
        format!("{}/hook", server.uri()),
    );
    monitor.interval_seconds = 0;
    store.insert_monitor(monitor.clone()).await;
    let p = pipeline(store);

    let (tx, rx) = watch::channel(false);
    let scheduler = {
        let scheduler = p.scheduler.clone();
        let rx = rx.clone();
        tokio::spawn(async move { scheduler.run(rx).await })
    };
    let worker = tokio::spawn(p.worker.clone().run(rx.clone()));
    let notifier = tokio::spawn(p.notifier.clone().run(rx));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let delivered = loop {
        let incidents = p.store.incidents_for(monitor.id).await;
        if let Some(incident) = incidents.first() {
            let logs = p.store.delivery_logs().await;
            if let Some(log) = logs.iter().find(|log| log.status == DeliveryStatus::Success) {
                assert!(incident.is_open());
                break log.clone();
            }
        }
        assert!(tokio::time::Instant::now() < deadline, "pipeline did not deliver an alert in time");
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    assert!(delivered.message.as_deref().unwrap_or("").starts_with("ALERT: "));

    tx.send(true).unwrap();
    for handle in [scheduler, worker, notifier] {
        tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
    }

    let open: Vec<_> = p.store
        .incidents_for(monitor.id)
        .await
        .into_iter()
        .filter(|incident| incident.is_open())
        .collect();
    assert_eq!(open.len(), 1);
    assert!(p.broker.snapshot(&p.names.alerts_dead).is_empty());
}
