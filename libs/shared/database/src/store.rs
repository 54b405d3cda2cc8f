use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::{
    CheckResult, DeliveryLog, Incident, Monitor, MonitorStatus, NewCheckResult,
};

use crate::DatabaseError;

/// Durable state read and written by the check pipeline.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn get_monitor(&self, monitor_id: Uuid) -> Result<Option<Monitor>, DatabaseError>;

    async fn list_active_monitors(&self) -> Result<Vec<Monitor>, DatabaseError>;

    async fn update_monitor_status(
        &self,
        monitor_id: Uuid,
        status: MonitorStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    async fn insert_check_result(&self, result: &NewCheckResult) -> Result<CheckResult, DatabaseError>;

    /// Most recent results first.
    async fn recent_check_results(
        &self,
        monitor_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CheckResult>, DatabaseError>;

    /// The result immediately preceding the most recent one.
    async fn previous_check_result(&self, monitor_id: Uuid) -> Result<Option<CheckResult>, DatabaseError> {
        let mut recent = self.recent_check_results(monitor_id, 2).await?;
        if recent.len() < 2 {
            return Ok(None);
        }
        Ok(Some(recent.swap_remove(1)))
    }

    async fn active_incident(&self, monitor_id: Uuid) -> Result<Option<Incident>, DatabaseError>;

    /// Inserts an open incident. Returns `None` when the monitor already has
    /// one open; the store must enforce this atomically.
    async fn create_incident(&self, incident: &Incident) -> Result<Option<Incident>, DatabaseError>;

    /// Marks an open incident resolved. Returns `None` when it was no longer open.
    async fn resolve_incident(
        &self,
        incident_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<Incident>, DatabaseError>;
}

#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    async fn insert_delivery_log(&self, log: &DeliveryLog) -> Result<(), DatabaseError>;

    async fn delivery_logs_for_alert(&self, alert_id: Uuid) -> Result<Vec<DeliveryLog>, DatabaseError>;
}
