use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use shared_database::MonitorStore;
use shared_models::{AlertKind, CheckJob, Monitor, MonitorStatus};
use shared_queue::{JobQueue, QueueError};
use shared_utils::retry_with_linear_backoff;

use crate::services::{
    alerts::{build_alerts, AlertTargets},
    evaluator::StateEvaluator,
    executor::{CheckExecutor, ProbeRequest},
    incident::IncidentManager,
};
use crate::{CheckError, IncidentAction, JobOutcome, JobReport, StateEvaluation, WorkerConfig};

/// Pulls check jobs and runs probe, persist, evaluate, incident and alert
/// steps for each one.
pub struct CheckWorkerService {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    store: Arc<dyn MonitorStore>,
    executor: CheckExecutor,
    evaluator: StateEvaluator,
    incidents: IncidentManager,
    targets: AlertTargets,
}

impl CheckWorkerService {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<JobQueue>,
        store: Arc<dyn MonitorStore>,
        targets: AlertTargets,
    ) -> Self {
        Self {
            config,
            queue,
            evaluator: StateEvaluator::new(store.clone()),
            incidents: IncidentManager::new(store.clone()),
            store,
            executor: CheckExecutor::new(),
            targets,
        }
    }

    /// Spawns `concurrency` pop loops and waits for all of them to stop.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(
            "Starting check worker {} with {} pipelines",
            self.config.worker_id, self.config.concurrency
        );

        let handles: Vec<_> = (0..self.config.concurrency)
            .map(|i| {
                let worker = self.clone();
                let shutdown = shutdown.clone();
                let name = format!("{}-{}", self.config.worker_id, i);
                tokio::spawn(async move { worker.worker_loop(name, shutdown).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Worker pipeline panicked: {}", e);
            }
        }

        info!("Check worker {} stopped", self.config.worker_id);
    }

    async fn worker_loop(&self, worker_name: String, mut shutdown: watch::Receiver<bool>) {
        debug!("Worker loop started: {}", worker_name);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let popped = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                popped = self.queue.pop_check_job() => popped,
            };

            match popped {
                Ok(job) => match self.process_job(job).await {
                    Ok(outcome) => debug!("Worker {} finished job: {:?}", worker_name, outcome),
                    Err(e) => error!("Worker {} failed to process job: {}", worker_name, e),
                },
                Err(QueueError::Closed) => break,
                Err(QueueError::SerializationError(e)) => {
                    warn!("Worker {} discarded an unreadable job: {}", worker_name, e);
                }
                Err(e) => {
                    error!("Worker {} failed to dequeue job: {}", worker_name, e);
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }

        debug!("Worker loop ended: {}", worker_name);
    }

    /// Runs the full pipeline for one job. A failed monitor lookup or result
    /// write is retried and then dead-lettered; an error is returned only when
    /// a later read against the store fails.
    #[instrument(skip(self, job), fields(job_id = %job.job_id, monitor_id = %job.monitor_id))]
    pub async fn process_job(&self, job: CheckJob) -> Result<JobOutcome, CheckError> {
        let lookup = retry_with_linear_backoff(
            self.config.persist_retry,
            "Monitor lookup",
            |_| self.store.get_monitor(job.monitor_id),
        )
        .await;

        // Only a monitor the store does not know is probed with defaults.
        let monitor = match lookup {
            Ok(monitor) => monitor,
            Err(e) => {
                return Ok(self.dead_letter(&job, &format!("Monitor lookup failed: {}", e)).await);
            }
        };

        let probe = ProbeRequest::for_job(&job, monitor.as_ref(), self.config.default_timeout);
        let result = self.executor.execute(job.monitor_id, &probe).await;
        info!(
            "Checked {}: {} (code {:?}, {}ms)",
            job.url, result.status, result.status_code, result.latency_ms
        );

        let persisted = retry_with_linear_backoff(
            self.config.persist_retry,
            "Check result write",
            |_| self.store.insert_check_result(&result),
        )
        .await;

        if let Err(e) = persisted {
            return Ok(self.dead_letter(&job, &e.to_string()).await);
        }

        if monitor.is_some() {
            if let Err(e) = self.store
                .update_monitor_status(job.monitor_id, MonitorStatus::from(result.status), result.checked_at)
                .await
            {
                warn!("Failed to update status of monitor {}: {}", job.monitor_id, e);
            }
        }

        let evaluation = self.evaluator.evaluate(job.monitor_id, result.status).await?;

        let action = if evaluation == StateEvaluation::StateChanged {
            self.incidents.handle(job.monitor_id, result.status).await?
        } else {
            IncidentAction::NoAction
        };

        let alerts_enqueued = self.enqueue_alerts(&job, monitor.as_ref(), &action).await;

        Ok(JobOutcome::Processed(JobReport {
            job_id: job.job_id,
            monitor_id: job.monitor_id,
            status: result.status,
            status_code: result.status_code,
            evaluation,
            action,
            alerts_enqueued,
        }))
    }

    async fn dead_letter(&self, job: &CheckJob, error: &str) -> JobOutcome {
        error!("Giving up on job {}: {}", job.job_id, error);

        match self.queue.dead_letter_job(job, error).await {
            Ok(()) => JobOutcome::DeadLettered { error: error.to_string() },
            Err(e) => {
                error!("Failed to dead-letter job {}: {}", job.job_id, e);
                JobOutcome::Dropped { error: error.to_string() }
            }
        }
    }

    /// Push failures are logged and not retried here.
    async fn enqueue_alerts(&self, job: &CheckJob, monitor: Option<&Monitor>, action: &IncidentAction) -> usize {
        let (kind, incident) = match action {
            IncidentAction::Created(incident) => (AlertKind::IncidentOpened, incident),
            IncidentAction::Resolved(incident) => (AlertKind::IncidentResolved, incident),
            IncidentAction::NoAction => return 0,
        };

        let contacts = self.targets.contacts_for(monitor);
        if contacts.is_empty() {
            warn!("No alert contacts for monitor {}; {} not announced", job.monitor_id, action);
            return 0;
        }

        let mut enqueued = 0;
        for alert in build_alerts(&job.url, incident, kind, &contacts) {
            match self.queue.push_alert(&alert).await {
                Ok(()) => {
                    info!("Alert {} queued for {} via {}", alert.alert_id, alert.target, alert.channel);
                    enqueued += 1;
                }
                Err(e) => error!("Failed to queue alert {} for monitor {}: {}", alert.alert_id, job.monitor_id, e),
            }
        }
        enqueued
    }
}
