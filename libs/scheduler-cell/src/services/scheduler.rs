use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_database::MonitorStore;
use shared_models::CheckJob;
use shared_queue::JobQueue;
use shared_utils::retry_with_linear_backoff;

use crate::{
    EnqueueOutcome, SchedulerConfig, SchedulerError, SchedulerStats, StatsSnapshot, TickReport,
};

/// A URL in the simplified scheduling pool. The id is stable for the
/// lifetime of the process so its results group under one monitor.
#[derive(Debug, Clone)]
pub struct PooledTarget {
    pub monitor_id: Uuid,
    pub url: String,
}

/// Where the scheduler learns what to check.
pub enum MonitorSource {
    /// Every active monitor whose interval has elapsed.
    Store(Arc<dyn MonitorStore>),
    /// One randomly chosen URL per tick.
    StaticPool(Vec<PooledTarget>),
}

impl std::fmt::Debug for MonitorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorSource::Store(_) => f.debug_tuple("Store").finish_non_exhaustive(),
            MonitorSource::StaticPool(targets) => {
                f.debug_tuple("StaticPool").field(targets).finish()
            }
        }
    }
}

impl MonitorSource {
    pub fn static_pool<I, S>(urls: I) -> Result<Self, SchedulerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool: Vec<PooledTarget> = urls
            .into_iter()
            .map(|url| PooledTarget {
                monitor_id: Uuid::new_v4(),
                url: url.into(),
            })
            .collect();

        if pool.is_empty() {
            return Err(SchedulerError::NoMonitorSource);
        }
        Ok(Self::StaticPool(pool))
    }
}

pub struct SchedulerService {
    config: SchedulerConfig,
    queue: Arc<JobQueue>,
    source: MonitorSource,
    last_enqueued: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    job_count: AtomicU64,
    failed_jobs: AtomicU64,
    dead_letter_failures: AtomicU64,
}

impl SchedulerService {
    pub fn new(config: SchedulerConfig, queue: Arc<JobQueue>, source: MonitorSource) -> Self {
        Self {
            config,
            queue,
            source,
            last_enqueued: Mutex::new(HashMap::new()),
            job_count: AtomicU64::new(0),
            failed_jobs: AtomicU64::new(0),
            dead_letter_failures: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            job_count: self.job_count.load(Ordering::Relaxed),
            failed_jobs: self.failed_jobs.load(Ordering::Relaxed),
            dead_letter_failures: self.dead_letter_failures.load(Ordering::Relaxed),
        }
    }

    /// Counters plus queue depths. Queue depths are omitted when the broker
    /// cannot be reached.
    pub async fn snapshot(&self) -> StatsSnapshot {
        let queues = match self.queue.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!("Queue stats unavailable: {}", e);
                None
            }
        };

        StatsSnapshot {
            scheduler: self.stats(),
            queues,
        }
    }

    async fn log_stats(&self) {
        let snapshot = self.snapshot().await;
        match snapshot.queues {
            Some(queues) => info!(
                "Scheduler stats: {} jobs queued, {} failed, {} lost | queues: jobs={} jobs:dead={} alerts={} alerts:dead={}",
                snapshot.scheduler.job_count,
                snapshot.scheduler.failed_jobs,
                snapshot.scheduler.dead_letter_failures,
                queues.jobs,
                queues.jobs_dead,
                queues.alerts,
                queues.alerts_dead
            ),
            None => info!(
                "Scheduler stats: {} jobs queued, {} failed, {} lost",
                snapshot.scheduler.job_count,
                snapshot.scheduler.failed_jobs,
                snapshot.scheduler.dead_letter_failures
            ),
        }
    }

    /// Runs ticks until `shutdown` flips to true or its sender is dropped,
    /// then logs final stats and closes the queue. In-flight enqueues are not
    /// awaited.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler started. Queuing jobs every {}ms",
            self.config.tick_interval.as_millis()
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats_ticker = interval(self.config.stats_interval);
        stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        stats_ticker.tick().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_tick().await {
                        error!("Scheduler tick failed: {}", e);
                    }
                }
                _ = stats_ticker.tick() => {
                    self.log_stats().await;
                }
            }
        }

        info!("Scheduler shutting down");
        self.log_stats().await;
        self.queue.close().await;
    }

    /// Enqueues one job per due monitor (or one pooled URL).
    #[instrument(skip(self))]
    pub async fn run_tick(&self) -> Result<TickReport, SchedulerError> {
        let jobs = self.due_jobs().await?;
        let mut report = TickReport {
            due: jobs.len(),
            ..TickReport::default()
        };

        for job in jobs {
            let outcome = self.enqueue(&job).await;
            if matches!(outcome, EnqueueOutcome::Enqueued { .. }) {
                self.last_enqueued.lock().await.insert(job.monitor_id, job.enqueued_at);
            }
            report.record(outcome);
        }

        debug!("Tick complete: {:?}", report);
        Ok(report)
    }

    async fn due_jobs(&self) -> Result<Vec<CheckJob>, SchedulerError> {
        match &self.source {
            MonitorSource::Store(store) => {
                let monitors = store.list_active_monitors().await?;
                let now = Utc::now();
                let last_enqueued = self.last_enqueued.lock().await;

                Ok(monitors
                    .iter()
                    .filter(|monitor| {
                        if monitor.interval().is_none() {
                            warn!(
                                "Monitor {} has an out-of-range interval of {}s; skipping",
                                monitor.id, monitor.interval_seconds
                            );
                            return false;
                        }
                        monitor.is_due(now, last_enqueued.get(&monitor.id).copied())
                    })
                    .map(|monitor| CheckJob::new(monitor.id, monitor.url.clone()))
                    .collect())
            }
            MonitorSource::StaticPool(pool) => {
                let picked = pool.choose(&mut rand::thread_rng());
                Ok(picked
                    .map(|target| CheckJob::new(target.monitor_id, target.url.clone()))
                    .into_iter()
                    .collect())
            }
        }
    }

    /// Pushes `job` onto `jobs` with bounded retry, falling back to
    /// `jobs:dead`. Never returns an error.
    #[instrument(skip(self, job), fields(job_id = %job.job_id, monitor_id = %job.monitor_id))]
    pub async fn enqueue(&self, job: &CheckJob) -> EnqueueOutcome {
        let pushed = retry_with_linear_backoff(
            self.config.push_retry,
            "Check job push",
            |attempt| async move {
                self.queue.push_check_job(job).await.map(|_| attempt)
            },
        )
        .await;

        let error = match pushed {
            Ok(attempts) => {
                let count = self.job_count.fetch_add(1, Ordering::Relaxed) + 1;
                info!("Job queued (#{}): {} -> {}", count, job.job_id, job.url);
                return EnqueueOutcome::Enqueued { attempts };
            }
            Err(e) => e,
        };

        self.failed_jobs.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Giving up on job {} after {} attempts: {}",
            job.job_id,
            self.config.push_retry.max_attempts(),
            error
        );

        match self.queue.dead_letter_job(job, &error.to_string()).await {
            Ok(()) => {
                info!("Job {} moved to {}", job.job_id, self.queue.names().jobs_dead);
                EnqueueOutcome::DeadLettered
            }
            Err(e) => {
                self.dead_letter_failures.fetch_add(1, Ordering::Relaxed);
                error!("Failed to dead-letter job {}: {}", job.job_id, e);
                EnqueueOutcome::Lost
            }
        }
    }
}
