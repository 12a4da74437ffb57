//! Export pipeline
//!
//! This module turns unexported keys into published archives:
//! - [`batch`] - Per-partition bundles and `export.bin`
//! - [`format`] - The "EK Export v1" protobuf messages
//! - [`signer`] - ECDSA P-256 signatures and `export.sig`
//! - [`archive`] - Zip packaging
//! - [`index`] - `list.json` for static hosting
//! - [`coordinator`] - Orchestration and the export commit
//! - [`summary`] - Reporting

pub mod archive;
pub mod batch;
pub mod coordinator;
pub mod format;
pub mod index;
pub mod signer;
pub mod summary;

pub use archive::archive_export;
pub use batch::{write_export_bin, ExportBundle};
pub use coordinator::ExportCoordinator;
pub use format::{decode_export, encode_export, SignatureInfo, TemporaryExposureKeyExport};
pub use signer::{verify, ExportSigner};
pub use summary::{ExportSummary, ExportedArchive};
