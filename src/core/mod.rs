//! Core business logic for TEK Exporter.
//!
//! # Modules
//!
//! - [`ingest`] - Canonicalization, deduplication and storage of uploaded keys
//! - [`export`] - Bundling, signing, archiving and the export commit
//! - [`sorter`] - Canonical order for exposure metric documents
//! - [`exposure_data`] - Content-addressed storage of exposure metric documents
//!
//! # Export Workflow
//!
//! 1. **Select**: Find partitions with unexported keys
//! 2. **Lock**: Open a storage session that holds the partition's rows
//! 3. **Encode**: Write `export.bin` (header plus protobuf)
//! 4. **Sign**: Write `export.sig` over the exact binary
//! 5. **Archive**: Pack both into a fresh `diagnosis_keys-*.zip`
//! 6. **Commit**: Mark exactly the bundled keys exported
//! 7. **Report**: Generate export summary
//!
//! # Example
//!
//! ```rust,no_run
//! use tek_exporter::adapters::database::create_key_store;
//! use tek_exporter::config::load_config;
//! use tek_exporter::core::export::ExportCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tek-exporter.toml")?;
//! let store = create_key_store(&config).await?;
//!
//! // Create shutdown signal
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = ExportCoordinator::new(&config, store, shutdown_rx)?;
//! let summary = coordinator.execute_export(None).await?;
//!
//! println!("Exported {} keys", summary.keys_exported);
//! # Ok(())
//! # }
//! ```

pub mod exposure_data;
pub mod export;
pub mod ingest;
pub mod sorter;
