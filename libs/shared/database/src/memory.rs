use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::{
    CheckResult, DeliveryLog, Incident, Monitor, MonitorStatus, NewCheckResult,
};

use crate::{DatabaseError, DeliveryLogStore, MonitorStore};

#[derive(Default)]
struct MemoryState {
    monitors: HashMap<Uuid, Monitor>,
    check_results: Vec<CheckResult>,
    incidents: Vec<Incident>,
    delivery_logs: Vec<DeliveryLog>,
}

/// Process-local store used by tests and single-node development runs.
/// Every operation takes the state lock once, so incident creation is
/// check-and-insert under one write guard.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_monitor(&self, monitor: Monitor) {
        let mut state = self.state.write().await;
        state.monitors.insert(monitor.id, monitor);
    }

    pub async fn incidents_for(&self, monitor_id: Uuid) -> Vec<Incident> {
        let state = self.state.read().await;
        state.incidents
            .iter()
            .filter(|incident| incident.monitor_id == monitor_id)
            .cloned()
            .collect()
    }

    pub async fn delivery_logs(&self) -> Vec<DeliveryLog> {
        self.state.read().await.delivery_logs.clone()
    }
}

#[async_trait]
impl MonitorStore for InMemoryStore {
    async fn get_monitor(&self, monitor_id: Uuid) -> Result<Option<Monitor>, DatabaseError> {
        Ok(self.state.read().await.monitors.get(&monitor_id).cloned())
    }

    async fn list_active_monitors(&self) -> Result<Vec<Monitor>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.monitors.values().filter(|m| m.is_active).cloned().collect())
    }

    async fn update_monitor_status(
        &self,
        monitor_id: Uuid,
        status: MonitorStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let monitor = state.monitors
            .get_mut(&monitor_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("monitor {}", monitor_id)))?;
        monitor.status = status;
        monitor.last_checked_at = Some(checked_at);
        Ok(())
    }

    async fn insert_check_result(&self, result: &NewCheckResult) -> Result<CheckResult, DatabaseError> {
        let record = result.clone().into_record(Uuid::new_v4());
        self.state.write().await.check_results.push(record.clone());
        Ok(record)
    }

    async fn recent_check_results(
        &self,
        monitor_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CheckResult>, DatabaseError> {
        let state = self.state.read().await;
        let mut rows: Vec<(usize, &CheckResult)> = state.check_results
            .iter()
            .enumerate()
            .filter(|(_, row)| row.monitor_id == monitor_id)
            .collect();

        // Insertion order breaks ties between identical timestamps.
        rows.sort_by(|(ia, a), (ib, b)| b.checked_at.cmp(&a.checked_at).then(ib.cmp(ia)));

        Ok(rows.into_iter().take(limit).map(|(_, row)| row.clone()).collect())
    }

    async fn active_incident(&self, monitor_id: Uuid) -> Result<Option<Incident>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.incidents
            .iter()
            .find(|incident| incident.monitor_id == monitor_id && incident.is_open())
            .cloned())
    }

    async fn create_incident(&self, incident: &Incident) -> Result<Option<Incident>, DatabaseError> {
        let mut state = self.state.write().await;
        let already_open = state.incidents
            .iter()
            .any(|existing| existing.monitor_id == incident.monitor_id && existing.is_open());

        if already_open {
            return Ok(None);
        }

        state.incidents.push(incident.clone());
        Ok(Some(incident.clone()))
    }

    async fn resolve_incident(
        &self,
        incident_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<Incident>, DatabaseError> {
        let mut state = self.state.write().await;
        match state.incidents.iter_mut().find(|incident| incident.id == incident_id) {
            Some(incident) if incident.is_open() => {
                incident.resolve(resolved_at);
                Ok(Some(incident.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl DeliveryLogStore for InMemoryStore {
    async fn insert_delivery_log(&self, log: &DeliveryLog) -> Result<(), DatabaseError> {
        self.state.write().await.delivery_logs.push(log.clone());
        Ok(())
    }

    async fn delivery_logs_for_alert(&self, alert_id: Uuid) -> Result<Vec<DeliveryLog>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.delivery_logs
            .iter()
            .filter(|log| log.alert_id == alert_id)
            .cloned()
            .collect())
    }
}
