//! HTTP API: sync control plane, query endpoints, health, and metrics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::EngineMetrics,
    store::SnapshotStore,
    BatchRunner, StartRejection, SyncRequest,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub runner: Arc<BatchRunner>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: EngineMetrics,
        runner: Arc<BatchRunner>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            runner,
            snapshots,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Start a sync batch. Returns 202 with the job record; 409 when a batch of
/// the same kind is already running for the customer.
async fn start_sync(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> impl IntoResponse {
    match state.runner.start(request) {
        Ok(job) => (StatusCode::ACCEPTED, Json(json!(job))),
        Err(StartRejection::AlreadyInProgress { job_id }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "sync already in progress",
                "job_id": job_id,
            })),
        ),
        Err(StartRejection::NoDevices) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "request listed no devices" })),
        ),
    }
}

async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.runner.job(&id) {
        Some(job) => (StatusCode::OK, Json(json!(job))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "unknown batch" })),
        ),
    }
}

async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> impl IntoResponse {
    match state.snapshots.get(&device_id) {
        Some(snapshot) => (StatusCode::OK, Json(json!(snapshot))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "device has never been synced" })),
        ),
    }
}

/// Live pattern-matching diagnosis; queries the feed service on demand
async fn get_device_diagnosis(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> impl IntoResponse {
    match state.runner.diagnose_device(&device_id).await {
        Ok(diagnosis) => (StatusCode::OK, Json(json!(diagnosis))),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Devices carrying a tier recommendation, most savings first
async fn list_recommendations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut devices: Vec<_> = state
        .snapshots
        .list()
        .into_iter()
        .filter(|s| s.recommendation_action.is_some())
        .collect();
    devices.sort_by(|a, b| {
        b.potential_monthly_savings
            .unwrap_or(0.0)
            .partial_cmp(&a.potential_monthly_savings.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    (StatusCode::OK, Json(json!(devices)))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/sync", post(start_sync))
        .route("/api/v1/batches/:id", get(get_batch))
        .route("/api/v1/devices/:device_id", get(get_device))
        .route("/api/v1/devices/:device_id/diagnosis", get(get_device_diagnosis))
        .route("/api/v1/recommendations", get(list_recommendations))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use engine_lib::batch::BatchConfig;
    use engine_lib::catalog::InMemoryCatalog;
    use engine_lib::feed_http::HttpFeedClient;
    use engine_lib::recommend::SkuEngine;
    use engine_lib::resolver::{Resolver, ResolverConfig};
    use engine_lib::store::{InMemoryAggregateStore, InMemoryJobStore, InMemorySnapshotStore};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        // The feed URL is never contacted by the endpoints under test
        let client = Arc::new(
            HttpFeedClient::new("http://localhost:1", "test-token").unwrap(),
        );
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let resolver = Resolver::new(client.clone(), ResolverConfig::default());
        let runner = Arc::new(BatchRunner::new(
            client,
            Arc::new(InMemoryCatalog::with_defaults()),
            snapshots.clone(),
            Arc::new(InMemoryAggregateStore::new()),
            Arc::new(InMemoryJobStore::new()),
            resolver,
            SkuEngine::default(),
            BatchConfig::default(),
        ));
        Arc::new(AppState::new(
            HealthRegistry::new(),
            EngineMetrics::new(),
            runner,
            snapshots,
        ))
    }

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_unavailable_before_initialization() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_batch_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/batches/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unsynced_device_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/devices/dev-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_with_no_devices_is_400() {
        let app = create_router(test_state());
        let body = serde_json::json!({
            "customer_id": "cust-1",
            "kind": "status",
            "devices": [],
        });
        let response = app
            .oneshot(
                Request::post("/api/v1/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_recommendations_empty_by_default() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/recommendations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
