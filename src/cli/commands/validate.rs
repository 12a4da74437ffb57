//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the configuration file and the signing key it points at.

use crate::config::{load_config, redact_connection_string};
use crate::core::export::format::SignatureInfo;
use crate::core::export::ExportSigner;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let signature_info = SignatureInfo::ecdsa_p256(
            &config.signing.verification_key_id,
            &config.signing.verification_key_version,
        );
        let key_ok = match ExportSigner::from_pem_file(&config.signing.private_key_path, signature_info) {
            Ok(_) => {
                println!("✅ Signing key loaded");
                true
            }
            Err(e) => {
                println!("❌ Signing key unusable");
                println!("   Error: {e}");
                false
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  PostgreSQL Connection: {}",
            redact_connection_string(&config.postgresql.connection_string)
        );
        println!("  Max Connections: {}", config.postgresql.max_connections);
        println!("  SSL Mode: {}", config.postgresql.ssl_mode);
        println!("  Storage Path: {}", config.storage.base_path);
        println!("  Public URL: {}", config.storage.base_url);
        println!("  Signing Key: {}", config.signing.private_key_path);
        println!(
            "  Verification Key: {} ({})",
            config.signing.verification_key_id, config.signing.verification_key_version
        );
        println!("  Partition Scheme: {}", config.ingest.partition_scheme);
        println!("  Dedup Scope: {}", config.ingest.dedup_scope);
        println!("  Dry Run: {}", config.is_dry_run());
        println!();

        Ok(if key_ok { 0 } else { 2 })
    }
}
