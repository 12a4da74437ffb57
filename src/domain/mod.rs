//! Domain models and types
//!
//! This module contains the core domain types shared by ingestion and export.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PartitionKey`], [`IdempotencyKey`], [`DedupKey`])
//! - **The stored key model** ([`DiagnosisKeyRecord`], [`ReportType`])
//! - **Upload payloads** ([`UploadPayload`], [`Submission`])
//! - **Error types** ([`TekError`]) and the [`Result`] alias
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, TekError>`]:
//!
//! ```rust
//! use tek_exporter::domain::{PartitionKey, Result, TekError};
//!
//! fn example() -> Result<PartitionKey> {
//!     PartitionKey::cluster("123456").map_err(TekError::Validation)
//! }
//! ```

pub mod diagnosis_key;
pub mod errors;
pub mod ids;
pub mod result;
pub mod submission;

// Re-export commonly used types for convenience
pub use diagnosis_key::{DiagnosisKeyRecord, DiagnosisKeyRecordBuilder, ReportType};
pub use errors::{ExportErrorDetail, TekError};
pub use ids::{DedupKey, DedupScope, IdempotencyKey, PartitionKey, PartitionScheme};
pub use result::Result;
pub use submission::{OnsetSource, RawKey, Submission, TransmissionRisk, UploadPayload};
