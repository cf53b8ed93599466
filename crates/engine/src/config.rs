//! Engine configuration

use anyhow::Result;
use serde::Deserialize;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Worker name used in structured log events
    #[serde(default = "default_worker_name")]
    pub worker_name: String,

    /// API server port for sync requests, health, and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Base URL of the monitoring feed API
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,

    /// Bearer token for the monitoring feed API
    #[serde(default)]
    pub feed_api_token: String,

    /// Delay between devices within a batch, in milliseconds
    #[serde(default = "default_device_delay_ms")]
    pub device_delay_ms: u64,

    /// Delay between successive instance calls, in milliseconds
    #[serde(default = "default_instance_call_delay_ms")]
    pub instance_call_delay_ms: u64,
}

fn default_worker_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "engine-1".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_feed_base_url() -> String {
    "http://monitoring-feed:9090".to_string()
}

fn default_device_delay_ms() -> u64 {
    500
}

fn default_instance_call_delay_ms() -> u64 {
    250
}

impl EngineConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENGINE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| EngineConfig {
            worker_name: default_worker_name(),
            api_port: default_api_port(),
            feed_base_url: default_feed_base_url(),
            feed_api_token: String::new(),
            device_delay_ms: default_device_delay_ms(),
            instance_call_delay_ms: default_instance_call_delay_ms(),
        }))
    }
}
