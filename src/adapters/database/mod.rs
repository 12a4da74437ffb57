//! Key store abstraction layer
//!
//! This module provides a trait-based abstraction for key storage, allowing
//! the pipelines to run against PostgreSQL or the in-memory store.

pub mod factory;
pub mod traits;

pub use factory::create_key_store;
pub use traits::{BulkInsertResult, ExportSession, KeyStore, PartitionStatus};
