//! Export summary and reporting
//!
//! This module defines structures for tracking and reporting export results.

use crate::domain::errors::ExportErrorDetail;
use std::path::PathBuf;
use std::time::Duration;

/// One archive produced by an export run
#[derive(Debug, Clone)]
pub struct ExportedArchive {
    pub partition: String,
    pub path: PathBuf,
    pub url: String,
    pub key_count: usize,
}

/// Summary of an export run
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Partitions that had unexported keys when the run started
    pub partitions_found: usize,

    /// Partitions whose archive was written and committed
    pub partitions_exported: usize,

    /// Partitions skipped because another exporter held them or nothing was left
    pub partitions_skipped: usize,

    /// Keys marked exported by this run
    pub keys_exported: usize,

    /// Archives written (on a dry run, none)
    pub archives: Vec<ExportedArchive>,

    /// Errors encountered during export
    pub errors: Vec<ExportErrorDetail>,

    /// Set when a shutdown signal stopped the run between partitions
    pub interrupted: bool,

    pub dry_run: bool,

    /// Duration of the export
    pub duration: Duration,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: ExportErrorDetail) {
        self.errors.push(error);
    }

    /// Record a committed archive
    pub fn add_archive(&mut self, archive: ExportedArchive) {
        self.partitions_exported += 1;
        self.keys_exported += archive.key_count;
        self.archives.push(archive);
    }

    /// Check if the export was successful (no failed partitions)
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            partitions_found = self.partitions_found,
            partitions_exported = self.partitions_exported,
            partitions_skipped = self.partitions_skipped,
            keys_exported = self.keys_exported,
            interrupted = self.interrupted,
            dry_run = self.dry_run,
            duration_ms = self.duration.as_millis(),
            "Export completed"
        );

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Export completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    partition = ?error.partition,
                    key_count = ?error.key_count,
                    message = %error.message,
                    "Export error"
                );
            }
        }
    }
}
