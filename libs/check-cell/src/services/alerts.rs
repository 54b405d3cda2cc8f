use shared_config::AppConfig;
use shared_models::{AlertChannel, AlertContact, AlertEvent, AlertKind, Incident, Monitor};

pub fn alert_message(kind: AlertKind, url: &str) -> String {
    match kind {
        AlertKind::IncidentOpened => format!("ALERT: {} is DOWN", url),
        AlertKind::IncidentResolved => format!("RECOVERED: {} is back UP", url),
    }
}

/// Fallback recipients for monitors that carry no contacts of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertTargets {
    pub default_email: Option<String>,
    pub default_webhook: Option<String>,
}

impl AlertTargets {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            default_email: config.alert_default_email.clone(),
            default_webhook: config.alert_default_webhook.clone(),
        }
    }

    pub fn defaults(&self) -> Vec<AlertContact> {
        let email = self.default_email.iter().map(|target| AlertContact {
            channel: AlertChannel::Email,
            target: target.clone(),
        });
        let webhook = self.default_webhook.iter().map(|target| AlertContact {
            channel: AlertChannel::Webhook,
            target: target.clone(),
        });
        email.chain(webhook).collect()
    }

    pub fn contacts_for(&self, monitor: Option<&Monitor>) -> Vec<AlertContact> {
        match monitor {
            Some(monitor) if !monitor.alert_contacts.is_empty() => monitor.alert_contacts.clone(),
            _ => self.defaults(),
        }
    }
}

/// One first-attempt event per contact.
pub fn build_alerts(url: &str, incident: &Incident, kind: AlertKind, contacts: &[AlertContact]) -> Vec<AlertEvent> {
    let message = alert_message(kind, url);
    contacts
        .iter()
        .map(|contact| {
            AlertEvent::new(
                incident.monitor_id,
                Some(incident.id),
                kind,
                contact.channel,
                contact.target.clone(),
                message.clone(),
            )
        })
        .collect()
}
