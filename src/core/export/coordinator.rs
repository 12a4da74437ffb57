//! Export coordinator - main orchestrator for the export process
//!
//! For each partition with unexported keys the coordinator opens a storage
//! session, builds the bundle, writes and signs `export.bin`, packs the
//! archive and only then commits the `exported` flags. Any failure before the
//! commit rolls the session back, so the keys are picked up again next run.

use crate::adapters::database::traits::{ExportSession, KeyStore};
use crate::config::TekConfig;
use crate::core::export::archive::archive_export;
use crate::core::export::batch::{write_export_bin, ExportBundle};
use crate::core::export::format::{SignatureInfo, EXPORT_SIG_FILE_NAME};
use crate::core::export::index::{
    bundle_index, partition_dir, public_url, write_index, DIAGNOSIS_KEYS_DIR,
};
use crate::core::export::signer::ExportSigner;
use crate::core::export::summary::{ExportSummary, ExportedArchive};
use crate::domain::errors::ExportErrorDetail;
use crate::domain::ids::PartitionKey;
use crate::domain::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// What happened to one partition
#[derive(Debug)]
enum PartitionOutcome {
    Exported(ExportedArchive),
    /// Another exporter holds the partition
    Locked,
    /// Nothing left to export once the rows were locked
    Empty,
    DryRun { key_count: usize },
}

/// Export coordinator
pub struct ExportCoordinator {
    store: Arc<dyn KeyStore + Send + Sync>,
    signer: ExportSigner,
    base_path: PathBuf,
    base_url: String,
    dry_run: bool,
    write_index: bool,
    shutdown_signal: watch::Receiver<bool>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    ///
    /// Loads the signing key once; a missing or unreadable key fails here,
    /// before any partition is touched.
    pub fn new(
        config: &TekConfig,
        store: Arc<dyn KeyStore + Send + Sync>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Result<Self> {
        let signature_info = SignatureInfo::ecdsa_p256(
            &config.signing.verification_key_id,
            &config.signing.verification_key_version,
        );
        let signer = ExportSigner::from_pem_file(&config.signing.private_key_path, signature_info)?;

        Ok(Self::with_signer(config, store, signer, shutdown_signal))
    }

    /// Create a coordinator around an already loaded signer
    pub fn with_signer(
        config: &TekConfig,
        store: Arc<dyn KeyStore + Send + Sync>,
        signer: ExportSigner,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            signer,
            base_path: PathBuf::from(&config.storage.base_path),
            base_url: config.storage.base_url.clone(),
            dry_run: config.is_dry_run(),
            write_index: config.export.write_index,
            shutdown_signal,
        }
    }

    /// Check if shutdown has been requested
    fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Execute the export
    ///
    /// Exports every pending partition, or only those in `only` when given.
    /// A failed partition is recorded in the summary and the run moves on.
    pub async fn execute_export(&self, only: Option<&[PartitionKey]>) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let mut summary = ExportSummary::new();
        summary.dry_run = self.dry_run;

        tracing::info!(backend = self.store.backend_name(), "Starting export process");

        let mut partitions = self.store.pending_partitions().await?;
        if let Some(only) = only {
            partitions.retain(|p| only.contains(p));
        }
        summary.partitions_found = partitions.len();

        if partitions.is_empty() {
            tracing::info!("No partitions with unexported keys");
        }

        for partition in &partitions {
            if self.is_shutdown_requested() {
                tracing::warn!(
                    remaining = summary.partitions_found
                        - summary.partitions_exported
                        - summary.partitions_skipped
                        - summary.errors.len(),
                    "Shutdown requested, stopping before next partition"
                );
                summary.interrupted = true;
                break;
            }

            match self.export_partition(partition).await {
                Ok(PartitionOutcome::Exported(archive)) => summary.add_archive(archive),
                Ok(PartitionOutcome::Locked) => {
                    tracing::warn!(
                        partition = %partition,
                        "Partition is being exported elsewhere, skipping"
                    );
                    summary.partitions_skipped += 1;
                }
                Ok(PartitionOutcome::Empty) => {
                    tracing::debug!(partition = %partition, "No keys left to export");
                    summary.partitions_skipped += 1;
                }
                Ok(PartitionOutcome::DryRun { key_count }) => {
                    tracing::info!(
                        partition = %partition,
                        key_count,
                        "DRY RUN: Would export partition"
                    );
                    summary.partitions_skipped += 1;
                }
                Err(e) => {
                    tracing::error!(partition = %partition, error = %e, "Failed to export partition");
                    summary.add_error(
                        ExportErrorDetail::new(e.to_string()).with_partition(partition.to_string()),
                    );
                }
            }
        }

        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    async fn export_partition(&self, partition: &PartitionKey) -> Result<PartitionOutcome> {
        let Some(session) = self.store.begin_export(partition).await? else {
            return Ok(PartitionOutcome::Locked);
        };

        let records = session.records().to_vec();
        let Some(bundle) = ExportBundle::from_records(
            partition.clone(),
            records,
            self.signer.signature_info().clone(),
        ) else {
            session.rollback().await?;
            return Ok(PartitionOutcome::Empty);
        };

        let start_time = Instant::now();
        crate::log_partition_export_start!(partition, bundle.key_count());

        if self.dry_run {
            session.rollback().await?;
            return Ok(PartitionOutcome::DryRun {
                key_count: bundle.key_count(),
            });
        }

        let dir = partition_dir(&self.base_path, partition, DIAGNOSIS_KEYS_DIR);
        let archive_path = match self.write_archive(&bundle, &dir) {
            Ok(path) => path,
            Err(e) => {
                rollback_quietly(session).await;
                return Err(e);
            }
        };

        // The archive stays even if the commit fails; the keys are re-exported next run.
        let ids = bundle.record_ids();
        let updated = session.commit(&ids).await?;
        if updated != ids.len() as u64 {
            tracing::warn!(
                partition = %partition,
                expected = ids.len(),
                updated,
                "Export commit flipped an unexpected number of rows"
            );
        }

        let file_name = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let archive = ExportedArchive {
            partition: partition.to_string(),
            url: public_url(&self.base_url, DIAGNOSIS_KEYS_DIR, partition, &file_name),
            path: archive_path,
            key_count: bundle.key_count(),
        };
        crate::log_partition_export_complete!(
            partition,
            archive.key_count,
            archive.path.display(),
            start_time.elapsed()
        );

        if self.write_index {
            if let Err(e) = self.refresh_index(partition) {
                tracing::warn!(partition = %partition, error = %e, "Failed to write list.json");
            }
        }

        Ok(PartitionOutcome::Exported(archive))
    }

    /// `export.bin` then `export.sig` then the archive
    fn write_archive(&self, bundle: &ExportBundle, dir: &Path) -> Result<PathBuf> {
        let bin_path = write_export_bin(bundle, dir)?;
        let result = self
            .signer
            .write_signature_file(&bin_path, dir, bundle.batch_num, bundle.batch_size)
            .and_then(|sig_path| archive_export(&bin_path, &sig_path, dir));

        if result.is_err() {
            let _ = fs::remove_file(&bin_path);
            let _ = fs::remove_file(dir.join(EXPORT_SIG_FILE_NAME));
        }
        result
    }

    fn refresh_index(&self, partition: &PartitionKey) -> Result<PathBuf> {
        let entries = bundle_index(&self.base_path, &self.base_url, partition)?;
        write_index(
            &partition_dir(&self.base_path, partition, DIAGNOSIS_KEYS_DIR),
            &entries,
        )
    }
}

async fn rollback_quietly(session: Box<dyn ExportSession>) {
    let partition = session.partition().clone();
    if let Err(e) = session.rollback().await {
        tracing::warn!(partition = %partition, error = %e, "Export rollback failed");
    }
}
