//! API client for communicating with the Rightsizer Engine

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the Rightsizer Engine
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API request/response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub customer_id: String,
    pub kind: String,
    pub devices: Vec<DeviceRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRef {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub customer_id: String,
    pub kind: String,
    pub status: String,
    pub processed: usize,
    pub total: usize,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub started_at: String,
    #[serde(default)]
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub avg: f64,
    pub max: f64,
    pub status: String,
    pub sizing: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceValue {
    pub instance_id: String,
    pub display_name: String,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub customer_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub instance_values: BTreeMap<String, Vec<InstanceValue>>,
    pub overall_status: String,
    pub overall_sizing: String,
    #[serde(default)]
    pub available_feeds: Vec<String>,
    #[serde(default)]
    pub current_tier: Option<String>,
    #[serde(default)]
    pub recommended_tier: Option<String>,
    #[serde(default)]
    pub recommendation_action: Option<String>,
    #[serde(default)]
    pub recommendation_reason: Option<String>,
    #[serde(default)]
    pub potential_monthly_savings: Option<f64>,
    pub last_synced: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDiagnosis {
    pub metric: String,
    #[serde(default)]
    pub matched_feed: Option<String>,
    #[serde(default)]
    pub matched_feed_pattern: Option<String>,
    #[serde(default)]
    pub instances_queried: Vec<String>,
    #[serde(default)]
    pub matched_column: Option<String>,
    #[serde(default)]
    pub failure: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDiagnosis {
    pub device_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub available_feeds: Vec<String>,
    #[serde(default)]
    pub diagnoses: Vec<MetricDiagnosis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_parses_recommendation_list() {
        let mut server = mockito::Server::new_async().await;
        let body = json!([{
            "device_id": "vm-1",
            "customer_id": "cust-1",
            "resource_type": "AzureVM",
            "metrics": {},
            "instance_values": {},
            "overall_status": "healthy",
            "overall_sizing": "oversized",
            "available_feeds": [],
            "current_tier": "D4s_v4",
            "recommended_tier": "D2s_v4",
            "recommendation_action": "downsize",
            "recommendation_reason": "low utilization",
            "potential_monthly_savings": 70.08,
            "last_synced": "2026-08-26T00:00:00Z"
        }]);
        let mock = server
            .mock("GET", "/api/v1/recommendations")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let devices: Vec<DeviceSnapshot> = client.get("api/v1/recommendations").await.unwrap();

        mock.assert_async().await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].recommended_tier.as_deref(), Some("D2s_v4"));
        assert_eq!(devices[0].potential_monthly_savings, Some(70.08));
    }

    #[tokio::test]
    async fn test_post_sync_returns_job() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "id": "cust-1-status-1",
            "customer_id": "cust-1",
            "kind": "status",
            "status": "in_progress",
            "processed": 0,
            "total": 2,
            "errors": [],
            "started_at": "2026-08-26T00:00:00Z"
        });
        let mock = server
            .mock("POST", "/api/v1/sync")
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = SyncRequest {
            customer_id: "cust-1".into(),
            kind: "status".into(),
            devices: vec![
                DeviceRef {
                    device_id: "dev-1".into(),
                    current_tier: None,
                },
                DeviceRef {
                    device_id: "dev-2".into(),
                    current_tier: None,
                },
            ],
        };
        let job: JobRecord = client.post("api/v1/sync", &request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(job.status, "in_progress");
        assert_eq!(job.total, 2);
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/devices/dev-404")
            .with_status(404)
            .with_body(r#"{"error":"device has never been synced"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<DeviceSnapshot>("api/v1/devices/dev-404")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("never been synced"));
    }
}
