use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    CheckResult, DeliveryLog, Incident, Monitor, MonitorStatus, NewCheckResult,
};

use crate::{DatabaseError, DeliveryLogStore, MonitorStore};

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";
/// Postgres `unique_violation`; raised by the one-open-incident index.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE `code` from a PostgREST error body.
fn postgres_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("code")?
        .as_str()
        .map(str::to_string)
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(prefer) = prefer {
            headers.insert(
                "Prefer",
                HeaderValue::from_str(prefer).map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<reqwest::Response, DatabaseError> {
        if self.base_url.is_empty() {
            return Err(DatabaseError::NotConfigured);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self.client.request(method, &url)
            .headers(self.get_headers(prefer)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => DatabaseError::Auth(error_text),
                404 => DatabaseError::NotFound(error_text),
                409 => DatabaseError::Conflict(error_text),
                code => DatabaseError::Api { status: code, message: error_text },
            });
        }

        Ok(response)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, prefer).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Sends a request whose response body is ignored.
    pub async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> Result<(), DatabaseError> {
        self.send(method, path, body, Some(RETURN_MINIMAL)).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// PostgREST-backed store. The `incidents` table is expected to carry a
/// unique partial index on `(monitor_id) WHERE resolved_at IS NULL`; a
/// conflicting insert is reported as "already open".
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: SupabaseClient::new(config),
        }
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    fn first<T>(mut rows: Vec<T>) -> Option<T> {
        if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        }
    }
}

#[async_trait]
impl MonitorStore for SupabaseStore {
    async fn get_monitor(&self, monitor_id: Uuid) -> Result<Option<Monitor>, DatabaseError> {
        let path = format!("/rest/v1/monitors?id=eq.{}&select=*", monitor_id);
        let rows: Vec<Monitor> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(Self::first(rows))
    }

    async fn list_active_monitors(&self) -> Result<Vec<Monitor>, DatabaseError> {
        let path = "/rest/v1/monitors?is_active=eq.true&select=*";
        self.client.request(Method::GET, path, None, None).await
    }

    async fn update_monitor_status(
        &self,
        monitor_id: Uuid,
        status: MonitorStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let path = format!("/rest/v1/monitors?id=eq.{}", monitor_id);
        let body = json!({
            "status": status,
            "last_checked_at": checked_at,
        });
        self.client.execute(Method::PATCH, &path, Some(body)).await
    }

    async fn insert_check_result(&self, result: &NewCheckResult) -> Result<CheckResult, DatabaseError> {
        let rows: Vec<CheckResult> = self.client.request(
            Method::POST,
            "/rest/v1/check_results",
            Some(serde_json::to_value(result)?),
            Some(RETURN_REPRESENTATION),
        ).await?;

        Self::first(rows).ok_or_else(|| DatabaseError::Api {
            status: 201,
            message: "insert returned no check_results row".to_string(),
        })
    }

    async fn recent_check_results(
        &self,
        monitor_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CheckResult>, DatabaseError> {
        let path = format!(
            "/rest/v1/check_results?monitor_id=eq.{}&order=checked_at.desc&limit={}",
            monitor_id, limit
        );
        self.client.request(Method::GET, &path, None, None).await
    }

    async fn previous_check_result(&self, monitor_id: Uuid) -> Result<Option<CheckResult>, DatabaseError> {
        let path = format!(
            "/rest/v1/check_results?monitor_id=eq.{}&order=checked_at.desc&limit=1&offset=1",
            monitor_id
        );
        let rows: Vec<CheckResult> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(Self::first(rows))
    }

    async fn active_incident(&self, monitor_id: Uuid) -> Result<Option<Incident>, DatabaseError> {
        let path = format!(
            "/rest/v1/incidents?monitor_id=eq.{}&resolved_at=is.null&limit=1",
            monitor_id
        );
        let rows: Vec<Incident> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(Self::first(rows))
    }

    async fn create_incident(&self, incident: &Incident) -> Result<Option<Incident>, DatabaseError> {
        let result: Result<Vec<Incident>, DatabaseError> = self.client.request(
            Method::POST,
            "/rest/v1/incidents",
            Some(serde_json::to_value(incident)?),
            Some(RETURN_REPRESENTATION),
        ).await;

        match result {
            Ok(rows) => Ok(Self::first(rows)),
            Err(DatabaseError::Conflict(detail))
                if postgres_error_code(&detail).as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                debug!("Incident for monitor {} already open: {}", incident.monitor_id, detail);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn resolve_incident(
        &self,
        incident_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<Incident>, DatabaseError> {
        let path = format!("/rest/v1/incidents?id=eq.{}&resolved_at=is.null", incident_id);
        let body = json!({
            "resolved_at": resolved_at,
            "status": "RESOLVED",
        });
        let rows: Vec<Incident> = self.client.request(
            Method::PATCH,
            &path,
            Some(body),
            Some(RETURN_REPRESENTATION),
        ).await?;
        Ok(Self::first(rows))
    }
}

#[async_trait]
impl DeliveryLogStore for SupabaseStore {
    async fn insert_delivery_log(&self, log: &DeliveryLog) -> Result<(), DatabaseError> {
        self.client.execute(
            Method::POST,
            "/rest/v1/delivery_logs",
            Some(serde_json::to_value(log)?),
        ).await
    }

    async fn delivery_logs_for_alert(&self, alert_id: Uuid) -> Result<Vec<DeliveryLog>, DatabaseError> {
        let path = format!(
            "/rest/v1/delivery_logs?alert_id=eq.{}&order=logged_at.asc",
            alert_id
        );
        self.client.request(Method::GET, &path, None, None).await
    }
}
