//! Sync batch commands

use anyhow::{bail, Result};

use crate::client::{ApiClient, DeviceRef, JobRecord, SyncRequest};
use crate::output::{
    color_status, format_timestamp, print_info, print_success, print_warning, OutputFormat,
};

/// Parse a device spec of the form `device-id` or `device-id=CurrentTier`
pub fn parse_device_spec(spec: &str) -> Result<DeviceRef> {
    match spec.split_once('=') {
        Some((device, tier)) => {
            if device.is_empty() || tier.is_empty() {
                bail!("Invalid device spec '{}': expected DEVICE or DEVICE=TIER", spec);
            }
            Ok(DeviceRef {
                device_id: device.to_string(),
                current_tier: Some(tier.to_string()),
            })
        }
        None => {
            if spec.is_empty() {
                bail!("Device id cannot be empty");
            }
            Ok(DeviceRef {
                device_id: spec.to_string(),
                current_tier: None,
            })
        }
    }
}

/// Start a sync batch for a customer's devices
pub async fn start_sync(
    client: &ApiClient,
    customer: &str,
    kind: &str,
    device_specs: &[String],
    format: OutputFormat,
) -> Result<()> {
    let devices = device_specs
        .iter()
        .map(|s| parse_device_spec(s))
        .collect::<Result<Vec<_>>>()?;

    let request = SyncRequest {
        customer_id: customer.to_string(),
        kind: kind.to_string(),
        devices,
    };

    let job: JobRecord = client.post("api/v1/sync", &request).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        OutputFormat::Table => {
            print_success(&format!("Started {} sync for {}", kind, customer));
            println!("Job ID: {}", job.id);
            println!("Devices: {}", job.total);
            print_info(&format!("Track progress with: rsz batch {}", job.id));
        }
    }

    Ok(())
}

/// Show a batch's progress
pub async fn show_batch(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let job: JobRecord = client.get(&format!("api/v1/batches/{}", id)).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        OutputFormat::Table => {
            println!("Batch: {}", job.id);
            println!("Customer: {}", job.customer_id);
            println!("Kind: {}", job.kind);
            println!("Status: {}", color_status(&job.status));
            println!("Progress: {}/{}", job.processed, job.total);
            println!("Started: {}", format_timestamp(&job.started_at));
            if let Some(finished) = &job.finished_at {
                println!("Finished: {}", format_timestamp(finished));
            }
            if let Some(message) = &job.message {
                println!("Message: {}", message);
            }
            if !job.errors.is_empty() {
                print_warning(&format!("{} device error(s):", job.errors.len()));
                for error in &job.errors {
                    println!("  - {}", error);
                }
            }
        }
    }

    Ok(())
}
