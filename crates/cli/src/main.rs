//! Rightsizer CLI
//!
//! A command-line tool for starting sync batches, querying device
//! utilization, and debugging pattern matching against the Rightsizer
//! Engine.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{devices, diagnose, sync};

/// Rightsizer CLI
#[derive(Parser)]
#[command(name = "rsz")]
#[command(author, version, about = "CLI for the Rightsizer utilization engine", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via RSZ_API_URL env var)
    #[arg(long, env = "RSZ_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a sync batch
    Sync {
        /// Customer whose devices to sync
        #[arg(long, short)]
        customer: String,

        /// Batch kind (status or rightsizing)
        #[arg(long, short, default_value = "status")]
        kind: String,

        /// Devices to sync, as DEVICE or DEVICE=CURRENT_TIER
        #[arg(required = true)]
        devices: Vec<String>,
    },

    /// Show a sync batch's progress
    Batch {
        /// Batch job ID
        id: String,
    },

    /// Get devices and recommendations
    #[command(subcommand)]
    Get(GetCommands),

    /// Show pattern-matching diagnosis for a device
    Diagnose {
        /// Device ID
        device: String,
    },
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Show one device's latest snapshot
    Device {
        /// Device ID
        device: String,
    },

    /// List devices carrying a tier recommendation
    Recommendations {
        /// Filter by action (downsize, upsize, keep_current)
        #[arg(long)]
        action: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Sync {
            customer,
            kind,
            devices,
        } => {
            sync::start_sync(&client, &customer, &kind, &devices, cli.format).await?;
        }
        Commands::Batch { id } => {
            sync::show_batch(&client, &id, cli.format).await?;
        }
        Commands::Get(get_cmd) => match get_cmd {
            GetCommands::Device { device } => {
                devices::show_device(&client, &device, cli.format).await?;
            }
            GetCommands::Recommendations { action } => {
                devices::list_recommendations(&client, action, cli.format).await?;
            }
        },
        Commands::Diagnose { device } => {
            diagnose::show_diagnosis(&client, &device, cli.format).await?;
        }
    }

    Ok(())
}
