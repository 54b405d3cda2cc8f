use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{CheckStatus, Incident};
use shared_utils::RetryPolicy;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub concurrency: usize,
    /// Probe timeout for monitors that do not set one.
    pub default_timeout: Duration,
    /// Retries for a failed monitor lookup or check-result write before the
    /// job is dead-lettered.
    pub persist_retry: RetryPolicy,
    /// Pause after a broker error before popping again.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "check-worker".to_string(),
            concurrency: 10,
            default_timeout: Duration::from_millis(5000),
            persist_retry: RetryPolicy::default(),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            concurrency: config.worker_concurrency.max(1),
            default_timeout: Duration::from_millis(config.check_default_timeout_ms),
            ..Self::default()
        }
    }
}

/// How a new check result relates to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvaluation {
    NoPrevious,
    NoChange,
    StateChanged,
}

impl StateEvaluation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateEvaluation::NoPrevious => "NO_PREVIOUS",
            StateEvaluation::NoChange => "NO_CHANGE",
            StateEvaluation::StateChanged => "STATE_CHANGED",
        }
    }
}

impl fmt::Display for StateEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncidentAction {
    Created(Incident),
    Resolved(Incident),
    NoAction,
}

impl IncidentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentAction::Created(_) => "INCIDENT_CREATED",
            IncidentAction::Resolved(_) => "INCIDENT_RESOLVED",
            IncidentAction::NoAction => "NO_ACTION",
        }
    }

    pub fn incident(&self) -> Option<&Incident> {
        match self {
            IncidentAction::Created(incident) | IncidentAction::Resolved(incident) => Some(incident),
            IncidentAction::NoAction => None,
        }
    }
}

impl fmt::Display for IncidentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: Uuid,
    pub monitor_id: Uuid,
    pub status: CheckStatus,
    pub status_code: Option<u16>,
    pub evaluation: StateEvaluation,
    pub action: IncidentAction,
    pub alerts_enqueued: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Processed(JobReport),
    /// The monitor could not be read or the result could not be persisted;
    /// the job was parked on `jobs:dead`.
    DeadLettered { error: String },
    /// As `DeadLettered`, but `jobs:dead` rejected the job too.
    Dropped { error: String },
}
