//! Key store abstraction traits
//!
//! This module defines the storage contract the ingest and export pipelines
//! consume. Implementations must make the dedup check and the insert of one
//! upload a single unit, and must hold an export session's selected rows
//! until it commits or rolls back.

use crate::domain::diagnosis_key::DiagnosisKeyRecord;
use crate::domain::ids::{DedupScope, PartitionKey};
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a bulk insert operation
#[derive(Debug, Clone, Default)]
pub struct BulkInsertResult {
    /// Records that were stored, with their storage ids assigned
    pub inserted: Vec<DiagnosisKeyRecord>,

    /// Records skipped because an equivalent key already exists
    pub duplicates_skipped: usize,
}

impl BulkInsertResult {
    /// Number of stored records
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }
}

/// Export bookkeeping for one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatus {
    pub partition: PartitionKey,
    pub total_keys: u64,
    pub pending_keys: u64,
    /// Newest `created_at` among stored keys
    pub last_created_at: Option<i64>,
    /// When the most recent export commit happened
    pub last_exported_at: Option<DateTime<Utc>>,
}

impl PartitionStatus {
    pub fn exported_keys(&self) -> u64 {
        self.total_keys.saturating_sub(self.pending_keys)
    }
}

/// Key store trait
///
/// This trait defines the interface that all storage adapters must implement
/// for persisting diagnosis keys and handing them to the export pipeline.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Short name of the backend, used in logs and status output
    fn backend_name(&self) -> &str;

    /// Test the storage connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Create tables and indexes if they are missing
    async fn ensure_schema(&self) -> Result<()>;

    /// Stored records in `partition` whose key material equals `key_data`
    async fn find_keys(
        &self,
        partition: &PartitionKey,
        key_data: &[u8],
    ) -> Result<Vec<DiagnosisKeyRecord>>;

    /// Whether an equivalent record is already stored for `partition`
    ///
    /// Read-only. For a race-free decision use [`KeyStore::insert_new_keys`],
    /// which evaluates the same check inside its own transaction.
    async fn exists(
        &self,
        partition: &PartitionKey,
        record: &DiagnosisKeyRecord,
        scope: DedupScope,
    ) -> Result<bool>;

    /// Stores every record that does not already exist, as one unit
    ///
    /// Existing equivalents and unique-index conflicts are counted in
    /// `duplicates_skipped` rather than reported as errors. With `dry_run`
    /// the check runs but nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is stored then.
    async fn insert_new_keys(
        &self,
        records: Vec<DiagnosisKeyRecord>,
        scope: DedupScope,
        dry_run: bool,
    ) -> Result<BulkInsertResult>;

    /// Partitions that have at least one unexported key
    async fn pending_partitions(&self) -> Result<Vec<PartitionKey>>;

    /// Opens an export session over the unexported keys of a partition
    ///
    /// Returns `Ok(None)` when another exporter currently holds the
    /// partition.
    async fn begin_export(&self, partition: &PartitionKey)
        -> Result<Option<Box<dyn ExportSession>>>;

    /// Export bookkeeping for one partition, or all when `partition` is `None`
    async fn partition_status(&self, partition: Option<&PartitionKey>)
        -> Result<Vec<PartitionStatus>>;
}

/// An in-flight export of one partition
///
/// The selected records stay reserved for this session. Dropping a session
/// without calling [`commit`](ExportSession::commit) or
/// [`rollback`](ExportSession::rollback) leaves every record unexported.
#[async_trait]
pub trait ExportSession: Send {
    fn partition(&self) -> &PartitionKey;

    /// Unexported records in ascending storage id order
    fn records(&self) -> &[DiagnosisKeyRecord];

    /// Marks `ids` exported and ends the session
    ///
    /// Returns the number of records flipped.
    async fn commit(self: Box<Self>, ids: &[i64]) -> Result<u64>;

    /// Ends the session without changes
    async fn rollback(self: Box<Self>) -> Result<()>;
}
