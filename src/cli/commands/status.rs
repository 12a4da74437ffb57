//! Status command implementation
//!
//! This module implements the `status` command, which shows stored and
//! pending key counts per partition.

use crate::cli::commands::connect_store;
use crate::config::load_config;
use crate::domain::ids::PartitionKey;
use chrono::{DateTime, Utc};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Filter by partition
    #[arg(long)]
    pub partition: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        println!("📊 Export Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let partition = match &self.partition {
            Some(p) => match PartitionKey::parse(p, config.ingest.partition_scheme) {
                Ok(p) => Some(p),
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(3);
                }
            },
            None => None,
        };

        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let statuses = match store.partition_status(partition.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to load partition status");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if statuses.is_empty() {
            println!("No keys stored.");
            println!("Run 'tek-exporter ingest' to store uploaded keys.");
            return Ok(0);
        }

        println!("Found {} partition(s):", statuses.len());
        println!();
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:<22} {:<22}",
            "Partition", "Total", "Pending", "Exported", "Last Upload", "Last Export"
        );
        println!("{}", "-".repeat(100));

        for status in &statuses {
            let last_upload = status
                .last_created_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "Never".to_string());
            let last_export = status
                .last_exported_at
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "Never".to_string());

            println!(
                "{:<20} {:>10} {:>10} {:>10} {:<22} {:<22}",
                status.partition.to_string(),
                status.total_keys,
                status.pending_keys,
                status.exported_keys(),
                last_upload,
                last_export
            );
        }

        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_args_defaults() {
        let args = StatusArgs { partition: None };
        assert!(args.partition.is_none());
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let args = StatusArgs {
            partition: Some("123456".to_string()),
        };
        let code = args.execute("/nonexistent/tek-exporter.toml").await.unwrap();
        assert_eq!(code, 2);
    }
}
