//! Ingest command implementation
//!
//! This module implements the `ingest` command, which stores the keys of one
//! upload body read from a file or stdin.

use crate::cli::commands::connect_store;
use crate::config::load_config;
use crate::core::ingest::IngestCoordinator;
use clap::Args;
use std::io::Read;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Upload body (JSON); `-` reads stdin
    #[arg(short, long)]
    pub file: String,

    /// Target partition for `temporaryExposureKeys` uploads
    #[arg(long)]
    pub partition: Option<String>,

    /// Run the dedup check without storing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file, "Starting ingest command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let body = match read_body(&self.file) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("❌ Failed to read upload {}: {e}", self.file);
                return Ok(5);
            }
        };

        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let dry_run = self.dry_run || config.application.dry_run;
        let coordinator = IngestCoordinator::new(store, config.ingest.clone(), dry_run);

        let partition = match self.partition.as_deref().map(|p| coordinator.parse_partition(p)) {
            Some(Ok(p)) => Some(p),
            Some(Err(e)) => {
                eprintln!("❌ {e}");
                return Ok(3);
            }
            None => None,
        };

        match coordinator.ingest_bytes(&body, partition).await {
            Ok(summary) => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(0)
            }
            Err(e) if e.is_client_error() => {
                tracing::warn!(error = %e, "Upload rejected");
                eprintln!("❌ Upload rejected: {e}");
                Ok(3)
            }
            Err(e) => {
                tracing::error!(error = %e, "Ingest failed");
                eprintln!("❌ Ingest failed: {e}");
                Ok(5)
            }
        }
    }
}

fn read_body(file: &str) -> std::io::Result<Vec<u8>> {
    if file == "-" {
        let mut body = Vec::new();
        std::io::stdin().read_to_end(&mut body)?;
        Ok(body)
    } else {
        std::fs::read(file)
    }
}
