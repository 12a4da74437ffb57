//! Content-addressed exposure data store
//!
//! Uploaded exposure metric documents are validated, canonically sorted and
//! written to `<base_path>/<partition>/exposure_data/<sha256>.json`. The hash
//! covers the sorted document, so the same content always lands on the same
//! path and a repeat upload is a no-op.

use crate::config::schema::StorageConfig;
use crate::core::export::index::{
    exposure_data_index, partition_dir, public_url, write_index, ExposureDataIndexEntry,
    EXPOSURE_DATA_DIR,
};
use crate::core::sorter::{
    canonicalize_document, DAILY_SUMMARIES_FIELD, EXPOSURE_INFORMATIONS_FIELD,
    EXPOSURE_WINDOWS_FIELD,
};
use crate::domain::ids::PartitionKey;
use crate::domain::{Result, TekError};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const REQUIRED_FIELDS: [&str; 2] = ["en_version", "exposure_configuration"];

/// Outcome of storing one document
#[derive(Debug, Clone)]
pub struct StoredExposureData {
    pub file_name: String,
    pub url: String,
    pub path: PathBuf,
    /// False when an identical document was already stored
    pub created: bool,
    /// The sorted document with `file_name` and `url` added
    pub document: Value,
}

/// Checks the fields a usable exposure data document must carry
///
/// Requires `en_version`, `exposure_configuration` and either
/// `exposure_summary` with `exposure_informations` (v1 API) or
/// `daily_summaries` with `exposure_windows` (v2 API).
pub fn validate_document(document: &Value) -> Result<()> {
    let object = document
        .as_object()
        .ok_or_else(|| TekError::Validation("Exposure data must be a JSON object".to_string()))?;

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(TekError::Validation(format!(
                "Exposure data is missing `{field}`"
            )));
        }
    }

    let v1 = object.contains_key("exposure_summary")
        && object.contains_key(EXPOSURE_INFORMATIONS_FIELD);
    let v2 = object.contains_key(DAILY_SUMMARIES_FIELD) && object.contains_key(EXPOSURE_WINDOWS_FIELD);
    if !(v1 || v2) {
        return Err(TekError::Validation(
            "Exposure data needs `exposure_summary` with `exposure_informations` \
             or `daily_summaries` with `exposure_windows`"
                .to_string(),
        ));
    }
    Ok(())
}

/// Hex SHA-256 of the compact serialization, plus `.json`
pub fn content_file_name(document: &Value) -> Result<String> {
    let digest = Sha256::digest(serde_json::to_vec(document)?);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("{hex}.json"))
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Exposure data store rooted at the configured storage paths
#[derive(Debug, Clone)]
pub struct ExposureDataStore {
    base_path: PathBuf,
    base_url: String,
    max_upload_bytes: usize,
}

impl ExposureDataStore {
    pub fn new(storage: &StorageConfig, max_upload_bytes: usize) -> Self {
        Self {
            base_path: PathBuf::from(&storage.base_path),
            base_url: storage.base_url.clone(),
            max_upload_bytes,
        }
    }

    /// Validates, sorts and stores one uploaded document
    ///
    /// # Errors
    ///
    /// Returns [`TekError::Validation`] for an oversized, malformed or
    /// incomplete document and [`TekError::Io`] when the write fails.
    pub fn put(&self, partition: &PartitionKey, body: &[u8]) -> Result<StoredExposureData> {
        if body.len() > self.max_upload_bytes {
            return Err(TekError::Validation(format!(
                "Exposure data of {} bytes exceeds the limit of {} bytes",
                body.len(),
                self.max_upload_bytes
            )));
        }

        let mut document: Value = serde_json::from_slice(body)
            .map_err(|e| TekError::Validation(format!("Malformed exposure data JSON: {e}")))?;
        validate_document(&document)?;
        canonicalize_document(&mut document)?;

        let file_name = content_file_name(&document)?;
        let url = public_url(&self.base_url, EXPOSURE_DATA_DIR, partition, &file_name);
        if let Some(object) = document.as_object_mut() {
            object.insert("file_name".to_string(), Value::String(file_name.clone()));
            object.insert("url".to_string(), Value::String(url.clone()));
        }

        let dir = partition_dir(&self.base_path, partition, EXPOSURE_DATA_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(&file_name);

        let created = if path.exists() {
            tracing::debug!(partition = %partition, file_name = %file_name, "Exposure data already stored");
            false
        } else {
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(&to_pretty_json(&document)?)?;
            temp.persist(&path).map_err(|e| TekError::Io(e.to_string()))?;
            tracing::info!(partition = %partition, file_name = %file_name, "Stored exposure data");
            true
        };

        Ok(StoredExposureData {
            file_name,
            url,
            path,
            created,
            document,
        })
    }

    /// Stored documents of a partition, newest first
    pub fn list(&self, partition: &PartitionKey) -> Result<Vec<ExposureDataIndexEntry>> {
        exposure_data_index(&self.base_path, &self.base_url, partition)
    }

    /// Rewrites the partition's `exposure_data/list.json`
    pub fn write_index(&self, partition: &PartitionKey) -> Result<PathBuf> {
        let entries = self.list(partition)?;
        write_index(
            &partition_dir(&self.base_path, partition, EXPOSURE_DATA_DIR),
            &entries,
        )
    }
}
