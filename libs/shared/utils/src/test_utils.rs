use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{AlertChannel, AlertEvent, AlertKind, CheckStatus, Monitor};

pub struct TestConfig {
    pub queue_prefix: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub check_timeout_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            queue_prefix: format!("test_{}", &Uuid::new_v4().simple().to_string()[..8]),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            check_timeout_ms: 500,
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(mut self, url: impl Into<String>) -> Self {
        self.supabase_url = url.into();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            queue_prefix: self.queue_prefix.clone(),
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            check_default_timeout_ms: self.check_timeout_ms,
            worker_concurrency: 2,
            notifier_concurrency: 2,
            scheduler_tick_ms: 10,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestMonitor;

impl TestMonitor {
    /// Active monitor that has never been checked.
    pub fn pointing_at(url: impl Into<String>) -> Monitor {
        Monitor::new("test monitor", url, 60)
    }

    pub fn with_webhook(url: impl Into<String>, webhook: impl Into<String>) -> Monitor {
        Self::pointing_at(url).with_contact(AlertChannel::Webhook, webhook)
    }

    /// Monitor whose last check happened `seconds_ago`.
    pub fn checked(url: impl Into<String>, interval_seconds: u64, seconds_ago: i64) -> Monitor {
        let mut monitor = Monitor::new("test monitor", url, interval_seconds);
        monitor.last_checked_at = Some(Utc::now() - Duration::seconds(seconds_ago));
        monitor
    }
}

pub struct TestAlert;

impl TestAlert {
    pub fn webhook(target: impl Into<String>) -> AlertEvent {
        AlertEvent::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            AlertKind::IncidentOpened,
            AlertChannel::Webhook,
            target,
            "ALERT: https://down.example is DOWN",
        )
    }

    pub fn email(target: impl Into<String>) -> AlertEvent {
        AlertEvent::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            AlertKind::IncidentOpened,
            AlertChannel::Email,
            target,
            "ALERT: https://down.example is DOWN",
        )
    }
}

/// PostgREST row bodies for wiremock-backed store tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn monitor_row(monitor: &Monitor) -> Value {
        json!({
            "id": monitor.id,
            "name": monitor.name,
            "url": monitor.url,
            "method": monitor.method,
            "interval_seconds": monitor.interval_seconds,
            "timeout_ms": monitor.timeout_ms,
            "expected_status": monitor.expected_status,
            "status": monitor.status,
            "last_checked_at": monitor.last_checked_at,
            "is_active": monitor.is_active,
            "alert_contacts": monitor.alert_contacts,
        })
    }

    pub fn check_result_row(monitor_id: Uuid, status: CheckStatus, status_code: Option<u16>) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "monitor_id": monitor_id,
            "status": status,
            "status_code": status_code,
            "latency_ms": 42,
            "error": null,
            "checked_at": Utc::now().to_rfc3339(),
        })
    }

    pub fn open_incident_row(monitor_id: Uuid) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "monitor_id": monitor_id,
            "started_at": Utc::now().to_rfc3339(),
            "resolved_at": null,
            "status": "OPEN",
        })
    }

    pub fn conflict() -> Value {
        json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"incidents_one_open_per_monitor\""
        })
    }

    pub fn foreign_key_violation() -> Value {
        json!({
            "code": "23503",
            "message": "insert or update on table \"incidents\" violates foreign key constraint \"incidents_monitor_id_fkey\""
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::Incident;

    #[test]
    fn test_config_namespaces_queues() {
        let a = TestConfig::default();
        let b = TestConfig::default();
        assert!(a.queue_prefix.starts_with("test_"));
        assert_ne!(a.queue_prefix, b.queue_prefix);
        assert_eq!(a.to_app_config().check_default_timeout_ms, 500);
    }

    #[test]
    fn checked_monitor_is_not_due_inside_interval() {
        let monitor = TestMonitor::checked("https://ok.example", 60, 10);
        assert!(!monitor.is_due(Utc::now(), None));
    }

    #[test]
    fn incident_row_deserializes() {
        let row = MockSupabaseResponses::open_incident_row(Uuid::new_v4());
        let incident: Incident = serde_json::from_value(row).unwrap();
        assert!(incident.is_open());
    }
}
