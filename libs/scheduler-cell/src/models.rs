use std::time::Duration;

use serde::{Deserialize, Serialize};

use shared_config::AppConfig;
use shared_queue::QueueStats;
use shared_utils::RetryPolicy;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub stats_interval: Duration,
    /// Retries for a failed `jobs` push before the job is dead-lettered.
    pub push_retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(5000),
            stats_interval: Duration::from_secs(30),
            push_retry: RetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.scheduler_tick_ms.max(1)),
            stats_interval: Duration::from_secs(config.scheduler_stats_interval_secs.max(1)),
            ..Self::default()
        }
    }
}

/// Process-local counters. Informational only; nothing branches on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub job_count: u64,
    pub failed_jobs: u64,
    pub dead_letter_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub scheduler: SchedulerStats,
    pub queues: Option<QueueStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued { attempts: u32 },
    DeadLettered,
    /// Neither `jobs` nor `jobs:dead` accepted the job.
    Lost,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub enqueued: usize,
    pub dead_lettered: usize,
    pub lost: usize,
}

impl TickReport {
    pub fn record(&mut self, outcome: EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Enqueued { .. } => self.enqueued += 1,
            EnqueueOutcome::DeadLettered => self.dead_lettered += 1,
            EnqueueOutcome::Lost => self.lost += 1,
        }
    }
}
