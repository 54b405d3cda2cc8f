use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use shared_models::{AlertEvent, CheckJob};

use crate::{QueueBroker, QueueError};

/// Keys of the logical queues, optionally namespaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub jobs: String,
    pub jobs_dead: String,
    pub alerts: String,
    pub alerts_dead: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

impl QueueNames {
    pub fn with_prefix(prefix: &str) -> Self {
        let key = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}:{}", prefix, name)
            }
        };

        Self {
            jobs: key("jobs"),
            jobs_dead: key("jobs:dead"),
            alerts: key("alerts"),
            alerts_dead: key("alerts:dead"),
        }
    }
}

/// Envelope for anything parked on a dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter<T> {
    pub payload: T,
    pub error: String,
    pub dead_at: DateTime<Utc>,
}

impl<T> DeadLetter<T> {
    pub fn new(payload: T, error: impl Into<String>) -> Self {
        Self {
            payload,
            error: error.into(),
            dead_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub jobs: u64,
    pub jobs_dead: u64,
    pub alerts: u64,
    pub alerts_dead: u64,
}

/// Typed access to the `jobs` and `alerts` queues and their dead letters.
pub struct JobQueue {
    broker: Arc<dyn QueueBroker>,
    names: QueueNames,
}

impl JobQueue {
    pub fn new(broker: Arc<dyn QueueBroker>, names: QueueNames) -> Self {
        Self { broker, names }
    }

    pub fn names(&self) -> &QueueNames {
        &self.names
    }

    pub fn broker(&self) -> &Arc<dyn QueueBroker> {
        &self.broker
    }

    pub async fn push_check_job(&self, job: &CheckJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        self.broker.push(&self.names.jobs, payload).await?;
        debug!("Check job {} enqueued for monitor {}", job.job_id, job.monitor_id);
        Ok(())
    }

    pub async fn pop_check_job(&self) -> Result<CheckJob, QueueError> {
        let payload = self.broker.pop(&self.names.jobs).await?;
        Ok(serde_json::from_str(&payload)?)
    }

    pub async fn dead_letter_job(&self, job: &CheckJob, error: &str) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&DeadLetter::new(job, error))?;
        self.broker.push(&self.names.jobs_dead, payload).await
    }

    pub async fn push_alert(&self, alert: &AlertEvent) -> Result<(), QueueError> {
        let payload = serde_json::to_string(alert)?;
        self.broker.push(&self.names.alerts, payload).await?;
        debug!("Alert {} enqueued (attempt {})", alert.alert_id, alert.attempt);
        Ok(())
    }

    pub async fn pop_alert(&self) -> Result<AlertEvent, QueueError> {
        let payload = self.broker.pop(&self.names.alerts).await?;
        Ok(serde_json::from_str(&payload)?)
    }

    /// Re-delivers `alert` on the alerts queue once `delay` has elapsed.
    pub async fn schedule_alert(&self, alert: &AlertEvent, delay: Duration) -> Result<(), QueueError> {
        let payload = serde_json::to_string(alert)?;
        self.broker.push_delayed(&self.names.alerts, payload, delay).await
    }

    pub async fn promote_due_alerts(&self) -> Result<usize, QueueError> {
        self.broker.promote_delayed(&self.names.alerts).await
    }

    pub async fn dead_letter_alert(&self, alert: &AlertEvent, error: &str) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&DeadLetter::new(alert, error))?;
        self.broker.push(&self.names.alerts_dead, payload).await
    }

    /// Moves up to `max` dead-lettered alerts back onto the alerts queue with
    /// a fresh attempt budget.
    pub async fn replay_dead_alerts(&self, max: usize) -> Result<usize, QueueError> {
        let drained = self.broker.drain(&self.names.alerts_dead, max).await?;
        let mut replayed = 0;

        for raw in drained {
            match serde_json::from_str::<DeadLetter<AlertEvent>>(&raw) {
                Ok(letter) => {
                    let mut alert = letter.payload;
                    alert.attempt = 1;
                    self.push_alert(&alert).await?;
                    replayed += 1;
                }
                Err(e) => {
                    warn!("Unreadable dead-lettered alert left in place: {}", e);
                    self.broker.push(&self.names.alerts_dead, raw).await?;
                }
            }
        }

        if replayed > 0 {
            info!("Replayed {} dead-lettered alerts", replayed);
        }
        Ok(replayed)
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            jobs: self.broker.len(&self.names.jobs).await?,
            jobs_dead: self.broker.len(&self.names.jobs_dead).await?,
            alerts: self.broker.len(&self.names.alerts).await?,
            alerts_dead: self.broker.len(&self.names.alerts_dead).await?,
        })
    }

    pub async fn close(&self) {
        self.broker.close().await;
    }
}
