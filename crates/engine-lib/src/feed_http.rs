//! HTTP implementation of the monitoring feed client
//!
//! Talks to the monitoring platform's REST API with JSON payloads. Any
//! transport, auth, or decode failure maps to
//! [`EngineError::ExternalServiceUnavailable`], which aborts the current
//! device only.

use crate::error::EngineError;
use crate::feed::{async_trait, FeedClient, FeedInfo, FeedInstance, TimeSeriesChunk};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Monitoring feed API client over HTTP+JSON
pub struct HttpFeedClient {
    client: Client,
    base_url: String,
}

impl HttpFeedClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, EngineError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| EngineError::ExternalServiceUnavailable(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| EngineError::ExternalServiceUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, EngineError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::ExternalServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ExternalServiceUnavailable(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::ExternalServiceUnavailable(e.to_string()))
    }
}

#[derive(Deserialize)]
struct FeedListResponse {
    feeds: Vec<FeedInfo>,
}

#[derive(Deserialize)]
struct InstanceListResponse {
    instances: Vec<FeedInstance>,
}

#[derive(Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "measurementNames")]
    measurement_names: Vec<String>,
    timestamps: Vec<i64>,
    #[serde(rename = "valueRows")]
    value_rows: Vec<Vec<Option<f64>>>,
    /// The platform reports how many columns actually carry data; absent in
    /// older API versions, where the name-list length is trusted.
    #[serde(rename = "validColumnCount")]
    valid_column_count: Option<usize>,
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn ping(&self) -> Result<(), EngineError> {
        let _: serde_json::Value = self.get_json("api/v1/health").await?;
        Ok(())
    }

    async fn list_feeds(&self, device_id: &str) -> Result<Vec<FeedInfo>, EngineError> {
        let response: FeedListResponse = self
            .get_json(&format!("api/v1/devices/{}/feeds", device_id))
            .await?;
        Ok(response.feeds)
    }

    async fn list_instances(
        &self,
        device_id: &str,
        feed_id: &str,
    ) -> Result<Vec<FeedInstance>, EngineError> {
        let response: InstanceListResponse = self
            .get_json(&format!(
                "api/v1/devices/{}/feeds/{}/instances",
                device_id, feed_id
            ))
            .await?;
        Ok(response.instances)
    }

    async fn get_time_series(
        &self,
        device_id: &str,
        feed_id: &str,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeriesChunk, EngineError> {
        let response: TimeSeriesResponse = self
            .get_json(&format!(
                "api/v1/devices/{}/feeds/{}/instances/{}/data?start={}&end={}",
                device_id,
                feed_id,
                instance_id,
                start.timestamp_millis(),
                end.timestamp_millis()
            ))
            .await?;

        let declared = response.measurement_names.len();
        Ok(TimeSeriesChunk {
            valid_column_count: response.valid_column_count.unwrap_or(declared),
            measurement_names: response.measurement_names,
            timestamps: response.timestamps,
            value_rows: response.value_rows,
        })
    }
}
