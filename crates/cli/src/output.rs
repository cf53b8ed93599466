//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
#[allow(dead_code)]
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
#[allow(dead_code)]
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a utilization percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format a monthly savings amount; negative means a cost increase
pub fn format_savings(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}/mo", -amount)
    } else {
        format!("${:.2}/mo", amount)
    }
}

/// Color a metric or device status
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "completed" => status.green().to_string(),
        "warning" | "in_progress" => status.yellow().to_string(),
        "critical" | "error" => status.red().to_string(),
        _ => status.dimmed().to_string(),
    }
}

/// Color a sizing signal
pub fn color_sizing(sizing: &str) -> String {
    match sizing.to_lowercase().as_str() {
        "rightsized" => sizing.green().to_string(),
        "oversized" => sizing.blue().to_string(),
        "undersized" => sizing.red().to_string(),
        _ => sizing.dimmed().to_string(),
    }
}

/// Color a recommendation action
pub fn color_action(action: &str) -> String {
    match action.to_lowercase().as_str() {
        "downsize" => action.blue().to_string(),
        "upsize" => action.red().to_string(),
        "keep_current" => action.green().to_string(),
        _ => action.to_string(),
    }
}

/// Format timestamp for display
pub fn format_timestamp(ts: &str) -> String {
    // Try to parse and format nicely, otherwise return as-is
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(ts) {
        dt.format("%Y-%m-%d %H:%M").to_string()
    } else {
        ts.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_savings_signs() {
        assert_eq!(format_savings(70.08), "$70.08/mo");
        assert_eq!(format_savings(-140.16), "-$140.16/mo");
        assert_eq!(format_savings(0.0), "$0.00/mo");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(93.75), "93.8%");
        assert_eq!(format_percent(0.0), "0.0%");
    }

    #[test]
    fn test_format_timestamp_falls_back_to_input() {
        assert_eq!(format_timestamp("not-a-date"), "not-a-date");
        assert_eq!(
            format_timestamp("2026-08-26T14:30:00Z"),
            "2026-08-26 14:30"
        );
    }
}
