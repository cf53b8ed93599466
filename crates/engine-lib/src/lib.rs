//! Engine library for infrastructure utilization and rightsizing
//!
//! This crate provides the core functionality for:
//! - Resource type detection from monitoring feed names
//! - Pattern-driven metric resolution and extraction
//! - Status and sizing classification
//! - Daily aggregation and trailing-window rollups
//! - SKU tier recommendations
//! - Batch sync execution, health checks, and observability

pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod classify;
pub mod error;
pub mod extract;
pub mod feed;
pub mod feed_http;
pub mod health;
pub mod matcher;
pub mod models;
pub mod observability;
pub mod pattern;
pub mod recommend;
pub mod resolver;
pub mod store;

pub use batch::{BatchConfig, BatchRunner, DeviceDiagnosis, DeviceRef, StartRejection, SyncRequest};
pub use error::EngineError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
