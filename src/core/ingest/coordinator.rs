//! Ingest coordinator
//!
//! Runs one upload through canonicalization, the in-upload dedup pass and the
//! store's atomic check-and-insert.

use crate::adapters::database::traits::KeyStore;
use crate::config::schema::IngestConfig;
use crate::core::ingest::canonicalize::{canonicalize_submission, KeyContext};
use crate::core::ingest::dedup::collapse_duplicates;
use crate::core::ingest::summary::{IngestSummary, InsertedKey};
use crate::domain::ids::PartitionKey;
use crate::domain::submission::{Submission, UploadPayload};
use crate::domain::{Result, TekError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Ingest coordinator
pub struct IngestCoordinator {
    store: Arc<dyn KeyStore + Send + Sync>,
    config: IngestConfig,
    dry_run: bool,
}

impl IngestCoordinator {
    /// Create a new ingest coordinator
    pub fn new(store: Arc<dyn KeyStore + Send + Sync>, config: IngestConfig, dry_run: bool) -> Self {
        Self {
            store,
            config,
            dry_run,
        }
    }

    /// Parses a partition name under the configured scheme
    pub fn parse_partition(&self, value: &str) -> Result<PartitionKey> {
        PartitionKey::parse(value, self.config.partition_scheme).map_err(TekError::Validation)
    }

    /// Ingests a raw upload body
    ///
    /// `partition` names the target of a `temporaryExposureKeys` upload.
    ///
    /// # Errors
    ///
    /// Returns [`TekError::Validation`] for an oversized or malformed body and
    /// for any invalid key; nothing is stored in that case.
    pub async fn ingest_bytes(
        &self,
        body: &[u8],
        partition: Option<PartitionKey>,
    ) -> Result<IngestSummary> {
        if body.len() > self.config.max_upload_bytes {
            return Err(TekError::Validation(format!(
                "Upload of {} bytes exceeds the limit of {} bytes",
                body.len(),
                self.config.max_upload_bytes
            )));
        }

        let submission = UploadPayload::from_json(body)?
            .into_submission(partition, self.config.partition_scheme)?;
        self.ingest(submission).await
    }

    /// Ingests an already resolved submission
    pub async fn ingest(&self, submission: Submission) -> Result<IngestSummary> {
        let start_time = Instant::now();
        let received_at = Utc::now().timestamp();

        let context =
            KeyContext::for_submission(&submission, received_at, self.config.default_transmission_risk);
        let records = canonicalize_submission(&submission, &context)?;

        let mut summary = IngestSummary::new(&submission.idempotency_key, &submission.partitions);
        summary.received = records.len();
        summary.dry_run = self.dry_run;

        let (unique, repeated) = collapse_duplicates(records, self.config.dedup_scope);
        if repeated > 0 {
            tracing::debug!(
                idempotency_key = %submission.idempotency_key,
                repeated,
                "Collapsed repeated keys within upload"
            );
        }

        let result = if unique.is_empty() {
            Default::default()
        } else {
            self.store
                .insert_new_keys(unique, self.config.dedup_scope, self.dry_run)
                .await?
        };

        summary.duplicates_skipped = repeated + result.duplicates_skipped;
        summary.inserted = result.inserted.iter().map(InsertedKey::from).collect();

        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        Ok(summary)
    }
}
