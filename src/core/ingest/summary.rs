//! Ingest summary and reporting

use crate::domain::diagnosis_key::DiagnosisKeyRecord;
use crate::domain::ids::{IdempotencyKey, PartitionKey};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::time::Duration;

/// A stored key as reported back to the uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedKey {
    pub partition: String,
    pub key: String,
    pub rolling_start_number: i32,
    pub rolling_period: i32,
    pub report_type: i32,
    pub transmission_risk: i32,
    pub days_since_onset_of_symptoms: i32,
}

impl From<&DiagnosisKeyRecord> for InsertedKey {
    fn from(record: &DiagnosisKeyRecord) -> Self {
        Self {
            partition: record.partition.to_string(),
            key: STANDARD.encode(&record.key_data),
            rolling_start_number: record.rolling_start_number,
            rolling_period: record.rolling_period,
            report_type: record.report_type.as_i32(),
            transmission_risk: record.transmission_risk_level,
            days_since_onset_of_symptoms: record.days_since_onset_of_symptoms,
        }
    }
}

/// Outcome of one upload
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub idempotency_key: String,

    /// Target partitions in resolution order
    pub partitions: Vec<String>,

    /// Canonical records produced from the upload, before dedup
    pub received: usize,

    /// Keys that were stored (or would be, on a dry run)
    pub inserted: Vec<InsertedKey>,

    /// Keys dropped as repeats within the upload or against storage
    pub duplicates_skipped: usize,

    pub dry_run: bool,

    #[serde(skip)]
    pub duration: Duration,
}

impl IngestSummary {
    pub fn new(idempotency_key: &IdempotencyKey, partitions: &[PartitionKey]) -> Self {
        Self {
            idempotency_key: idempotency_key.as_str().to_string(),
            partitions: partitions.iter().map(ToString::to_string).collect(),
            received: 0,
            inserted: Vec::new(),
            duplicates_skipped: 0,
            dry_run: false,
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        crate::log_ingest_result!(
            self.idempotency_key,
            self.partitions.len(),
            self.inserted_count(),
            self.duplicates_skipped
        );
        if self.dry_run {
            tracing::info!("DRY RUN: no keys were stored");
        }
    }
}
