//! Rightsizer Engine - utilization and tier recommendation service
//!
//! This binary exposes the sync control plane over HTTP: batches are
//! started per customer and run on background tasks against the
//! monitoring feed API.

use anyhow::{Context, Result};
use engine_lib::{
    batch::{BatchConfig, BatchRunner},
    catalog::InMemoryCatalog,
    feed_http::HttpFeedClient,
    health::{components, HealthRegistry},
    observability::{EngineMetrics, StructuredLogger},
    recommend::SkuEngine,
    resolver::{Resolver, ResolverConfig},
    store::{InMemoryAggregateStore, InMemoryJobStore, InMemorySnapshotStore},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting rightsizer-engine");

    // Load configuration
    let config = config::EngineConfig::load()?;
    info!(worker = %config.worker_name, feed = %config.feed_base_url, "Engine configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CATALOG).await;
    health_registry.register(components::FEED_CLIENT).await;
    health_registry.register(components::BATCH_RUNNER).await;
    health_registry.register(components::STORES).await;

    // Initialize metrics and structured logger
    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(&config.worker_name);
    logger.log_startup(ENGINE_VERSION);

    // Configuration catalog and stores
    let catalog = Arc::new(InMemoryCatalog::with_defaults());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let aggregates = Arc::new(InMemoryAggregateStore::new());
    let jobs = Arc::new(InMemoryJobStore::new());

    // Feed client and resolver
    let client = Arc::new(
        HttpFeedClient::new(&config.feed_base_url, &config.feed_api_token)
            .context("Failed to build feed client")?,
    );
    let resolver = Resolver::new(
        client.clone(),
        ResolverConfig {
            instance_call_delay: Duration::from_millis(config.instance_call_delay_ms),
            ..Default::default()
        },
    );

    // Batch runner
    let runner = Arc::new(BatchRunner::new(
        client,
        catalog,
        snapshots.clone(),
        aggregates,
        jobs,
        resolver,
        SkuEngine::default(),
        BatchConfig {
            device_delay: Duration::from_millis(config.device_delay_ms),
            ..Default::default()
        },
    ));

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        runner,
        snapshots,
    ));

    // Mark engine as ready after initialization
    health_registry.set_ready(true).await;

    // Start API server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");
    api_handle.abort();

    Ok(())
}
