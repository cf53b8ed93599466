//! CLI command implementations

pub mod devices;
pub mod diagnose;
pub mod sync;
