use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitor::MonitorStatus;

/// Error marker recorded for probes that never produced an HTTP response.
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Down,
}

impl From<CheckStatus> for MonitorStatus {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Up => MonitorStatus::Up,
            CheckStatus::Down => MonitorStatus::Down,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        MonitorStatus::from(*self).fmt(f)
    }
}

/// Ephemeral message placed on the `jobs` queue by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckJob {
    pub job_id: Uuid,
    pub monitor_id: Uuid,
    pub url: String,
    pub enqueued_at: DateTime<Utc>,
}

impl CheckJob {
    pub fn new(monitor_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            monitor_id,
            url: url.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// Outcome of one probe before it has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheckResult {
    pub monitor_id: Uuid,
    pub status: CheckStatus,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl NewCheckResult {
    pub fn network_error(monitor_id: Uuid, latency_ms: u64) -> Self {
        Self {
            monitor_id,
            status: CheckStatus::Down,
            status_code: None,
            latency_ms,
            error: Some(NETWORK_ERROR.to_string()),
            checked_at: Utc::now(),
        }
    }

    pub fn into_record(self, id: Uuid) -> CheckResult {
        CheckResult {
            id,
            monitor_id: self.monitor_id,
            status: self.status,
            status_code: self.status_code,
            latency_ms: self.latency_ms,
            error: self.error,
            checked_at: self.checked_at,
        }
    }
}

/// Append-only persisted probe outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub status: CheckStatus,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}
