//! Pattern-matching diagnosis command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, DeviceDiagnosis};
use crate::output::{print_warning, OutputFormat};

/// Show why each metric mapping did or did not resolve for a device
pub async fn show_diagnosis(
    client: &ApiClient,
    device_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let diagnosis: DeviceDiagnosis = client
        .get(&format!("api/v1/devices/{}/diagnosis", device_id))
        .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&diagnosis)?);
        }
        OutputFormat::Table => {
            println!("Device: {}", diagnosis.device_id);
            println!("Detected type: {}", diagnosis.resource_type);
            println!("Available feeds ({}):", diagnosis.available_feeds.len());
            for feed in &diagnosis.available_feeds {
                println!("  - {}", feed);
            }

            if diagnosis.diagnoses.is_empty() {
                print_warning("No metric mappings evaluated (unknown resource type)");
                return Ok(());
            }

            for entry in &diagnosis.diagnoses {
                println!();
                match &entry.failure {
                    None => {
                        println!("{} {}", "✓".green().bold(), entry.metric.bold());
                    }
                    Some(failure) => {
                        println!("{} {}", "✗".red().bold(), entry.metric.bold());
                        println!("  failure: {}", failure);
                    }
                }
                if let Some(feed) = &entry.matched_feed {
                    let pattern = entry.matched_feed_pattern.as_deref().unwrap_or("?");
                    println!("  feed: {} (pattern '{}')", feed, pattern);
                }
                if let Some(column) = &entry.matched_column {
                    println!("  column: {}", column);
                }
                if !entry.instances_queried.is_empty() {
                    println!("  instances: {}", entry.instances_queried.join(", "));
                }
            }
        }
    }

    Ok(())
}
