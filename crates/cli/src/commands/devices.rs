//! Device and recommendation query commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, DeviceSnapshot};
use crate::output::{
    color_action, color_sizing, color_status, format_percent, format_savings, format_timestamp,
    print_warning, OutputFormat,
};

/// Row for the per-metric table of one device
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Sizing")]
    sizing: String,
}

/// Row for the recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Recommended")]
    recommended: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Savings")]
    savings: String,
}

/// Show one device's latest snapshot
pub async fn show_device(client: &ApiClient, device_id: &str, format: OutputFormat) -> Result<()> {
    let snapshot: DeviceSnapshot = client.get(&format!("api/v1/devices/{}", device_id)).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Table => {
            println!("Device: {}", snapshot.device_id);
            println!("Customer: {}", snapshot.customer_id);
            println!("Type: {}", snapshot.resource_type);
            println!("Status: {}", color_status(&snapshot.overall_status));
            println!("Sizing: {}", color_sizing(&snapshot.overall_sizing));
            println!("Last synced: {}", format_timestamp(&snapshot.last_synced));

            if snapshot.metrics.is_empty() {
                print_warning("No metrics resolved for this device");
            } else {
                let rows: Vec<MetricRow> = snapshot
                    .metrics
                    .iter()
                    .map(|(name, value)| MetricRow {
                        metric: name.clone(),
                        avg: format_percent(value.avg),
                        max: format_percent(value.max),
                        status: color_status(&value.status),
                        sizing: color_sizing(&value.sizing),
                    })
                    .collect();
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("\n{}", table);
            }

            for (metric, instances) in &snapshot.instance_values {
                println!("\n{} instances:", metric);
                for instance in instances {
                    println!(
                        "  {} avg {} max {}",
                        instance.display_name,
                        format_percent(instance.avg),
                        format_percent(instance.max)
                    );
                }
            }

            if let Some(recommended) = &snapshot.recommended_tier {
                println!();
                println!(
                    "Recommendation: {} -> {} ({})",
                    snapshot.current_tier.as_deref().unwrap_or("?"),
                    recommended,
                    color_action(snapshot.recommendation_action.as_deref().unwrap_or("?")),
                );
                if let Some(savings) = snapshot.potential_monthly_savings {
                    println!("Estimated savings: {}", format_savings(savings));
                }
                if let Some(reason) = &snapshot.recommendation_reason {
                    println!("Reason: {}", reason);
                }
            }
        }
    }

    Ok(())
}

/// List devices carrying a tier recommendation
pub async fn list_recommendations(
    client: &ApiClient,
    action: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let devices: Vec<DeviceSnapshot> = client.get("api/v1/recommendations").await?;

    let filtered: Vec<_> = devices
        .into_iter()
        .filter(|d| {
            action
                .as_ref()
                .map(|a| {
                    d.recommendation_action
                        .as_deref()
                        .map(|da| da.eq_ignore_ascii_case(a))
                        .unwrap_or(false)
                })
                .unwrap_or(true)
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        OutputFormat::Table => {
            if filtered.is_empty() {
                print_warning("No recommendations found");
                return Ok(());
            }

            let rows: Vec<RecommendationRow> = filtered
                .iter()
                .map(|d| RecommendationRow {
                    device: d.device_id.clone(),
                    resource_type: d.resource_type.clone(),
                    current: d.current_tier.clone().unwrap_or_default(),
                    recommended: d.recommended_tier.clone().unwrap_or_default(),
                    action: color_action(d.recommendation_action.as_deref().unwrap_or("")),
                    savings: format_savings(d.potential_monthly_savings.unwrap_or(0.0)),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} devices", filtered.len());
        }
    }

    Ok(())
}
