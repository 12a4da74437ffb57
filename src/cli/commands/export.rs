//! Export command implementation
//!
//! This module implements the `export` command, which publishes one signed
//! archive per partition with unexported keys.

use crate::cli::commands::{connect_store, parse_partition_list};
use crate::config::load_config;
use crate::core::export::ExportCoordinator;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - build bundles without writing archives or marking keys exported
    #[arg(long)]
    pub dry_run: bool,

    /// Only export these partitions (comma-separated)
    #[arg(long)]
    pub partition: Option<String>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.export.dry_run = true;
        }

        let only = match &self.partition {
            Some(value) => match parse_partition_list(value, config.ingest.partition_scheme) {
                Ok(partitions) => {
                    tracing::info!(partitions = %value, "Restricting export to partitions from CLI");
                    Some(partitions)
                }
                Err(e) => {
                    eprintln!("❌ Invalid --partition: {e}");
                    return Ok(3);
                }
            },
            None => None,
        };

        if config.is_dry_run() {
            tracing::info!("Dry run mode enabled - no archives will be written");
            println!("🔍 DRY RUN MODE - No archives will be written, no keys marked exported");
            println!();
        }

        if !self.yes && !config.is_dry_run() {
            println!("Export Configuration:");
            println!("  Output: {}", config.storage.base_path);
            println!("  Public URL: {}", config.storage.base_url);
            println!(
                "  Partitions: {}",
                self.partition.as_deref().unwrap_or("All pending")
            );
            println!("  Verification key: {}", config.signing.verification_key_id);
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let coordinator = match ExportCoordinator::new(&config, store, shutdown_signal) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export coordinator");
                eprintln!("❌ Failed to initialize export: {e}");
                return Ok(2);
            }
        };

        println!("🚀 Starting export...");
        println!();

        let summary = match coordinator.execute_export(only.as_deref()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
        };

        println!("📊 Export Summary:");
        println!("  Partitions found: {}", summary.partitions_found);
        println!("  Partitions exported: {}", summary.partitions_exported);
        println!("  Partitions skipped: {}", summary.partitions_skipped);
        println!("  Keys exported: {}", summary.keys_exported);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        for archive in &summary.archives {
            println!(
                "  {} ({} keys) -> {}",
                archive.partition, archive.key_count, archive.url
            );
        }
        if !summary.archives.is_empty() {
            println!();
        }

        if !summary.errors.is_empty() {
            println!("⚠️  Errors encountered:");
            for error in &summary.errors {
                println!(
                    "  - {}: {}",
                    error.partition.as_deref().unwrap_or("-"),
                    error.message
                );
            }
            println!();
        }

        let exit_code = if summary.interrupted {
            println!("⚠️  Export interrupted. Remaining partitions stay pending for the next run.");
            tracing::info!("Export interrupted by user signal");
            130
        } else if summary.is_successful() {
            println!("✅ Export completed successfully!");
            0
        } else {
            println!("⚠️  Export completed with failures");
            1
        };

        Ok(exit_code)
    }
}
