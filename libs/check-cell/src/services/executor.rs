use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{Client, Method};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_models::{CheckJob, CheckStatus, HttpMethod, Monitor, NewCheckResult};

/// Everything needed to issue one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub url: String,
    pub method: HttpMethod,
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub expected_status: Option<u16>,
}

impl ProbeRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            timeout,
            headers: HashMap::new(),
            body: None,
            expected_status: None,
        }
    }

    /// Probe for `job`, honouring the monitor's request settings when the
    /// monitor is known. The job's URL always wins.
    pub fn for_job(job: &CheckJob, monitor: Option<&Monitor>, default_timeout: Duration) -> Self {
        let Some(monitor) = monitor else {
            return Self::get(job.url.clone(), default_timeout);
        };

        Self {
            url: job.url.clone(),
            method: monitor.method,
            timeout: monitor.timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout),
            headers: monitor.headers.clone(),
            body: monitor.body.clone(),
            expected_status: monitor.expected_status,
        }
    }
}

/// 2xx/3xx is up unless the monitor pins an exact expected code.
pub fn classify_status(status_code: u16, expected: Option<u16>) -> CheckStatus {
    let up = match expected {
        Some(expected) => status_code == expected,
        None => (200..400).contains(&status_code),
    };

    if up {
        CheckStatus::Up
    } else {
        CheckStatus::Down
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

pub struct CheckExecutor {
    client: Client,
}

impl Default for CheckExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckExecutor {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    /// Issues the probe and classifies the outcome. Transport failures,
    /// timeouts included, become a `DOWN` result with `NETWORK_ERROR`.
    #[instrument(skip(self, probe), fields(url = %probe.url))]
    pub async fn execute(&self, monitor_id: Uuid, probe: &ProbeRequest) -> NewCheckResult {
        let mut request = self.client
            .request(to_reqwest_method(probe.method), &probe.url)
            .timeout(probe.timeout);

        for (name, value) in &probe.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &probe.body {
            request = request.body(body.clone());
        }

        let start = Instant::now();
        let response = request.send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let code = response.status().as_u16();
                let status = classify_status(code, probe.expected_status);
                debug!("Probe {} answered {} in {}ms ({})", probe.url, code, latency_ms, status);

                NewCheckResult {
                    monitor_id,
                    status,
                    status_code: Some(code),
                    latency_ms,
                    error: None,
                    checked_at: Utc::now(),
                }
            }
            Err(e) => {
                debug!("Probe {} failed after {}ms: {}", probe.url, latency_ms, e);
                NewCheckResult::network_error(monitor_id, latency_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::AlertChannel;

    #[test]
    fn success_and_redirect_ranges_are_up() {
        assert_eq!(classify_status(200, None), CheckStatus::Up);
        assert_eq!(classify_status(204, None), CheckStatus::Up);
        assert_eq!(classify_status(301, None), CheckStatus::Up);
        assert_eq!(classify_status(399, None), CheckStatus::Up);
        assert_eq!(classify_status(404, None), CheckStatus::Down);
        assert_eq!(classify_status(503, None), CheckStatus::Down);
        assert_eq!(classify_status(199, None), CheckStatus::Down);
    }

    #[test]
    fn expected_status_must_match_exactly() {
        assert_eq!(classify_status(401, Some(401)), CheckStatus::Up);
        assert_eq!(classify_status(200, Some(201)), CheckStatus::Down);
    }

    #[test]
    fn probe_uses_monitor_settings() {
        let mut monitor = Monitor::new("api", "https://api.example/health", 30)
            .with_contact(AlertChannel::Email, "ops@example.com");
        monitor.method = HttpMethod::Head;
        monitor.timeout_ms = Some(1500);
        monitor.expected_status = Some(204);
        let job = CheckJob::new(monitor.id, monitor.url.clone());

        let probe = ProbeRequest::for_job(&job, Some(&monitor), Duration::from_secs(5));
        assert_eq!(probe.method, HttpMethod::Head);
        assert_eq!(probe.timeout, Duration::from_millis(1500));
        assert_eq!(probe.expected_status, Some(204));
    }

    #[test]
    fn unknown_monitor_gets_plain_get() {
        let job = CheckJob::new(Uuid::new_v4(), "https://example.com");
        let probe = ProbeRequest::for_job(&job, None, Duration::from_secs(5));
        assert_eq!(probe, ProbeRequest::get("https://example.com", Duration::from_secs(5)));
    }
}
