//! Storage integrations.
//!
//! - [`database`] - Key store traits and the factory
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process implementation used for dry runs and tests
//!
//! # Design Pattern
//!
//! The pipelines only see [`database::KeyStore`] and [`database::ExportSession`],
//! so every backend must provide the same atomicity: one upload is checked and
//! inserted as a unit, and an export session keeps its rows locked until it
//! commits or rolls back.
//!
//! ```rust,no_run
//! use tek_exporter::adapters::database::KeyStore;
//! use tek_exporter::adapters::memory::MemoryKeyStore;
//!
//! # async fn example() -> tek_exporter::domain::Result<()> {
//! let store = MemoryKeyStore::new();
//! for partition in store.pending_partitions().await? {
//!     println!("{partition} has keys waiting for export");
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
