use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest delivery attempt an alert may reach before it is abandoned.
pub const MAX_ALERT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    Email,
    Webhook,
}

impl AlertChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertChannel::Email => "email",
            AlertChannel::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    IncidentOpened,
    IncidentResolved,
}

/// A request to deliver one notification about an incident transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_id: Uuid,
    pub monitor_id: Uuid,
    #[serde(default)]
    pub incident_id: Option<Uuid>,
    pub kind: AlertKind,
    pub channel: AlertChannel,
    pub target: String,
    pub message: String,
    #[serde(default = "first_attempt")]
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

fn first_attempt() -> u32 {
    1
}

impl AlertEvent {
    pub fn new(
        monitor_id: Uuid,
        incident_id: Option<Uuid>,
        kind: AlertKind,
        channel: AlertChannel,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            monitor_id,
            incident_id,
            kind,
            channel,
            target: target.into(),
            message: message.into(),
            attempt: 1,
            created_at: Utc::now(),
        }
    }

    /// The same alert, re-issued for its next delivery attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < MAX_ALERT_ATTEMPTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

/// Append-only record of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub alert_id: Uuid,
    pub channel: AlertChannel,
    pub target: String,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub attempt: u32,
    pub logged_at: DateTime<Utc>,
}

impl DeliveryLog {
    pub fn success(event: &AlertEvent) -> Self {
        Self::from_event(event, DeliveryStatus::Success, None)
    }

    pub fn failed(event: &AlertEvent, error: impl Into<String>) -> Self {
        Self::from_event(event, DeliveryStatus::Failed, Some(error.into()))
    }

    fn from_event(event: &AlertEvent, status: DeliveryStatus, error: Option<String>) -> Self {
        Self {
            alert_id: event.alert_id,
            channel: event.channel,
            target: event.target.clone(),
            status,
            message: Some(event.message.clone()),
            error,
            attempt: event.attempt,
            logged_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> AlertEvent {
        AlertEvent::new(
            Uuid::new_v4(),
            None,
            AlertKind::IncidentOpened,
            AlertChannel::Webhook,
            "https://hooks.example/alert",
            "ALERT: https://ok.example is DOWN",
        )
    }

    #[test]
    fn next_attempt_keeps_identity() {
        let first = event();
        let second = first.next_attempt();
        assert_eq!(second.alert_id, first.alert_id);
        assert_eq!(second.attempt, 2);
        assert_eq!(second.target, first.target);
    }

    #[test]
    fn retry_stops_at_ceiling() {
        let mut alert = event();
        alert.attempt = MAX_ALERT_ATTEMPTS - 1;
        assert!(alert.can_retry());
        alert.attempt = MAX_ALERT_ATTEMPTS;
        assert!(!alert.can_retry());
    }

    #[test]
    fn missing_attempt_defaults_to_first() {
        let json = serde_json::json!({
            "alert_id": Uuid::new_v4(),
            "monitor_id": Uuid::new_v4(),
            "kind": "incident_resolved",
            "channel": "email",
            "target": "ops@example.com",
            "message": "RECOVERED",
            "created_at": Utc::now(),
        });
        let alert: AlertEvent = serde_json::from_value(json).unwrap();
        assert_eq!(alert.attempt, 1);
        assert_eq!(alert.channel, AlertChannel::Email);
    }
}
