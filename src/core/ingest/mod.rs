//! Key ingest
//!
//! - [`canonicalize`] - Raw key to canonical record
//! - [`dedup`] - Equivalence rules and in-upload collapsing
//! - [`coordinator`] - One upload end to end
//! - [`summary`] - Reporting

pub mod canonicalize;
pub mod coordinator;
pub mod dedup;
pub mod summary;

pub use canonicalize::{canonicalize, canonicalize_submission, KeyContext};
pub use coordinator::IngestCoordinator;
pub use dedup::{collapse_duplicates, is_equivalent};
pub use summary::{IngestSummary, InsertedKey};
