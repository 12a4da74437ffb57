//! Exposure data command implementation
//!
//! Stores one exposure metric document under its content hash and refreshes
//! the partition's `exposure_data/list.json`.

use crate::config::load_config;
use crate::core::exposure_data::ExposureDataStore;
use crate::domain::ids::PartitionKey;
use clap::Args;

/// Arguments for the exposure-data command
#[derive(Args, Debug)]
pub struct ExposureDataArgs {
    /// Exposure data document (JSON)
    #[arg(short, long)]
    pub file: String,

    /// Partition the document belongs to
    #[arg(long)]
    pub partition: String,
}

impl ExposureDataArgs {
    /// Execute the exposure-data command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file, partition = %self.partition, "Storing exposure data");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let partition = match PartitionKey::parse(&self.partition, config.ingest.partition_scheme) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(3);
            }
        };

        let body = match std::fs::read(&self.file) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("❌ Failed to read {}: {e}", self.file);
                return Ok(5);
            }
        };

        let store = ExposureDataStore::new(&config.storage, config.ingest.max_upload_bytes);
        let stored = match store.put(&partition, &body) {
            Ok(s) => s,
            Err(e) if e.is_client_error() => {
                eprintln!("❌ Exposure data rejected: {e}");
                return Ok(3);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to store exposure data");
                eprintln!("❌ Failed to store exposure data: {e}");
                return Ok(5);
            }
        };

        if let Err(e) = store.write_index(&partition) {
            tracing::warn!(partition = %partition, error = %e, "Failed to write list.json");
        }

        if stored.created {
            println!("✅ Stored {}", stored.url);
        } else {
            println!("Already stored: {}", stored.url);
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let args = ExposureDataArgs {
            file: "exposure.json".to_string(),
            partition: "123456".to_string(),
        };

        let code = args.execute("/nonexistent/tek-exporter.toml").await.unwrap();
        assert_eq!(code, 2);
    }
}
