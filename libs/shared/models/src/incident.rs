use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    Open,
    Resolved,
}

/// A bounded period during which a monitor is considered down. At most one
/// incident per monitor is open at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub status: IncidentStatus,
}

impl Incident {
    pub fn open(monitor_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            monitor_id,
            started_at,
            resolved_at: None,
            status: IncidentStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Open && self.resolved_at.is_none()
    }

    pub fn resolve(&mut self, resolved_at: DateTime<Utc>) {
        self.resolved_at = Some(resolved_at);
        self.status = IncidentStatus::Resolved;
    }
}
