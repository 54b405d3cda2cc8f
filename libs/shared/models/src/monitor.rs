use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::AlertChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        MonitorStatus::Unknown
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MonitorStatus::Up => "UP",
            MonitorStatus::Down => "DOWN",
            MonitorStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Get
    }
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Where notifications about a monitor's incidents are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContact {
    pub channel: AlertChannel,
    pub target: String,
}

/// A configured HTTP endpoint. Owned by the configuration store; the pipeline
/// only ever writes `status` and `last_checked_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub interval_seconds: u64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub expected_status: Option<u16>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: MonitorStatus,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub alert_contacts: Vec<AlertContact>,
}

fn default_active() -> bool {
    true
}

impl Monitor {
    pub fn new(name: impl Into<String>, url: impl Into<String>, interval_seconds: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            interval_seconds,
            timeout_ms: None,
            expected_status: None,
            headers: HashMap::new(),
            body: None,
            status: MonitorStatus::Unknown,
            last_checked_at: None,
            is_active: true,
            alert_contacts: Vec::new(),
        }
    }

    pub fn with_contact(mut self, channel: AlertChannel, target: impl Into<String>) -> Self {
        self.alert_contacts.push(AlertContact {
            channel,
            target: target.into(),
        });
        self
    }

    /// Check interval as a signed duration, or `None` when `interval_seconds`
    /// does not fit one.
    pub fn interval(&self) -> Option<Duration> {
        i64::try_from(self.interval_seconds)
            .ok()
            .and_then(Duration::try_seconds)
    }

    /// A monitor is due when its interval has elapsed since the later of its
    /// last recorded check and the last time a job was enqueued for it.
    /// Monitors with an out-of-range interval are never due.
    pub fn is_due(&self, now: DateTime<Utc>, last_enqueued: Option<DateTime<Utc>>) -> bool {
        if !self.is_active {
            return false;
        }

        let Some(interval) = self.interval() else {
            return false;
        };

        let reference = match (self.last_checked_at, last_enqueued) {
            (Some(checked), Some(enqueued)) => Some(checked.max(enqueued)),
            (checked, enqueued) => checked.or(enqueued),
        };

        match reference {
            None => true,
            Some(at) => now - at >= interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_checked_monitor_is_due() {
        let monitor = Monitor::new("api", "https://ok.example", 60);
        assert!(monitor.is_due(Utc::now(), None));
    }

    #[test]
    fn recent_enqueue_defers_next_check() {
        let mut monitor = Monitor::new("api", "https://ok.example", 60);
        let now = Utc::now();
        monitor.last_checked_at = Some(now - Duration::seconds(120));

        assert!(monitor.is_due(now, None));
        assert!(!monitor.is_due(now, Some(now - Duration::seconds(10))));
    }

    #[test]
    fn inactive_monitor_is_never_due() {
        let mut monitor = Monitor::new("api", "https://ok.example", 60);
        monitor.is_active = false;
        assert!(!monitor.is_due(Utc::now(), None));
    }

    #[test]
    fn out_of_range_interval_is_never_due() {
        let now = Utc::now();
        let mut monitor = Monitor::new("api", "https://ok.example", 1 << 60);
        assert!(monitor.interval().is_none());
        assert!(!monitor.is_due(now, None));

        monitor.interval_seconds = u64::MAX;
        monitor.last_checked_at = Some(now - Duration::seconds(1));
        assert!(!monitor.is_due(now, None));
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&MonitorStatus::Down).unwrap();
        assert_eq!(json, "\"DOWN\"");
    }
}
