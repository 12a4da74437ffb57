//! PostgreSQL storage backend
//!
//! Keys live in one `diagnosis_keys` table. Ingest and export serialize per
//! partition through transaction-scoped advisory locks.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
pub use models::PostgreSQLDiagnosisKey;
