// TEK Exporter - Temporary Exposure Key ingest and export
// Copyright (c) 2025 TEK Exporter Contributors
// Licensed under the MIT License

//! # TEK Exporter
//!
//! TEK Exporter stores temporary exposure keys uploaded by exposure
//! notification clients and publishes them as signed, per-partition export
//! archives that clients download from static hosting.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Ingesting** key uploads with canonicalization and deduplication
//! - **Exporting** unexported keys as `export.bin` + `export.sig` zip archives
//! - **Signing** export binaries with ECDSA P-256
//! - **Committing** exports so every key is published exactly once
//! - **Storing** exposure metric documents in a canonical order
//!
//! ## Architecture
//!
//! TEK Exporter follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (ingest, export, sorter, exposure data)
//! - [`adapters`] - Key store implementations (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tek_exporter::adapters::database::create_key_store;
//! use tek_exporter::config::load_config;
//! use tek_exporter::core::export::ExportCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let config = load_config("tek-exporter.toml")?;
//!     let store = create_key_store(&config).await?;
//!
//!     // Create export coordinator
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let coordinator = ExportCoordinator::new(&config, store, shutdown_rx)?;
//!
//!     // Execute export
//!     let summary = coordinator.execute_export(None).await?;
//!
//!     println!("Exported {} keys", summary.keys_exported);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! ### Deduplicated Ingest
//!
//! Each upload is canonicalized, collapsed against itself and then checked
//! against stored keys inside one transaction, so a retried upload stores
//! nothing twice:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tek_exporter::adapters::memory::MemoryKeyStore;
//! use tek_exporter::config::IngestConfig;
//! use tek_exporter::core::ingest::IngestCoordinator;
//!
//! # async fn example(body: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryKeyStore::new());
//! let ingest = IngestCoordinator::new(store, IngestConfig::default(), false);
//!
//! let partition = ingest.parse_partition("123456")?;
//! let summary = ingest.ingest_bytes(body, Some(partition)).await?;
//! println!("Stored {} keys", summary.inserted_count());
//! # Ok(())
//! # }
//! ```
//!
//! ### Exactly-Once Export
//!
//! An export session holds the selected keys of one partition. The keys are
//! marked exported only after the archive is complete, and only the keys
//! that went into it.
//!
//! ## Error Handling
//!
//! TEK Exporter uses the [`domain::TekError`] type for all errors:
//!
//! ```rust,no_run
//! use tek_exporter::domain::TekError;
//!
//! fn example() -> Result<(), TekError> {
//!     // Errors are automatically converted using the ? operator
//!     let _config = tek_exporter::config::load_config("tek-exporter.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! TEK Exporter uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!("Starting export");
//! warn!(partition = "123456", "Partition is being exported elsewhere");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
