//! Export batch building
//!
//! Groups the unexported records of one partition into an [`ExportBundle`]
//! and renders it as an `export.bin`.

use crate::core::export::format::{
    encode_export, write_artifact, SignatureInfo, TemporaryExposureKey,
    TemporaryExposureKeyExport, EXPORT_BIN_FILE_NAME,
};
use crate::domain::diagnosis_key::DiagnosisKeyRecord;
use crate::domain::ids::PartitionKey;
use crate::domain::Result;
use std::path::{Path, PathBuf};

/// Every run publishes a single-file batch
pub const DEFAULT_BATCH_NUM: i32 = 1;
pub const DEFAULT_BATCH_SIZE: i32 = 1;

/// The keys of one partition that go into one archive
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub partition: PartitionKey,

    /// Records in storage order
    pub records: Vec<DiagnosisKeyRecord>,

    /// Minimum `created_at` across `records`
    pub start_timestamp: i64,

    /// Maximum `created_at` across `records`
    pub end_timestamp: i64,

    pub batch_num: i32,
    pub batch_size: i32,
    pub signature_info: SignatureInfo,
}

impl ExportBundle {
    /// Builds a bundle, or `None` when there is nothing to export
    pub fn from_records(
        partition: PartitionKey,
        records: Vec<DiagnosisKeyRecord>,
        signature_info: SignatureInfo,
    ) -> Option<Self> {
        let start_timestamp = records.iter().map(|r| r.created_at).min()?;
        let end_timestamp = records.iter().map(|r| r.created_at).max()?;

        Some(Self {
            partition,
            records,
            start_timestamp,
            end_timestamp,
            batch_num: DEFAULT_BATCH_NUM,
            batch_size: DEFAULT_BATCH_SIZE,
            signature_info,
        })
    }

    pub fn key_count(&self) -> usize {
        self.records.len()
    }

    /// Storage ids of the bundled records, the set the commit marks exported
    pub fn record_ids(&self) -> Vec<i64> {
        self.records.iter().filter_map(|r| r.id).collect()
    }

    /// The protobuf message for this bundle
    pub fn to_export(&self) -> TemporaryExposureKeyExport {
        TemporaryExposureKeyExport {
            start_timestamp: Some(self.start_timestamp.max(0) as u64),
            end_timestamp: Some(self.end_timestamp.max(0) as u64),
            region: Some(self.partition.to_string()),
            batch_num: Some(self.batch_num),
            batch_size: Some(self.batch_size),
            signature_infos: vec![self.signature_info.clone()],
            keys: self.records.iter().map(to_wire_key).collect(),
            revised_keys: Vec::new(),
        }
    }

    /// Header plus encoded message
    pub fn encode(&self) -> Vec<u8> {
        encode_export(&self.to_export())
    }
}

fn to_wire_key(record: &DiagnosisKeyRecord) -> TemporaryExposureKey {
    TemporaryExposureKey {
        key_data: Some(record.key_data.clone()),
        transmission_risk_level: Some(record.transmission_risk_level),
        rolling_start_interval_number: Some(record.rolling_start_number),
        rolling_period: Some(record.rolling_period),
        report_type: Some(record.report_type.as_i32()),
        days_since_onset_of_symptoms: Some(record.days_since_onset_of_symptoms),
    }
}

/// Writes `<dir>/export.bin` and returns its absolute path
pub fn write_export_bin(bundle: &ExportBundle, dir: &Path) -> Result<PathBuf> {
    write_artifact(dir, EXPORT_BIN_FILE_NAME, &bundle.encode())
}
