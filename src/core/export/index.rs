//! Static `list.json` indexes
//!
//! A plain file server publishes each partition's artifacts; these indexes
//! tell clients which files exist and when they were written.

use crate::domain::ids::PartitionKey;
use crate::domain::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Directory under a partition holding export archives
pub const DIAGNOSIS_KEYS_DIR: &str = "diagnosis_keys";

/// Directory under a partition holding exposure data documents
pub const EXPOSURE_DATA_DIR: &str = "exposure_data";

pub const INDEX_FILE_NAME: &str = "list.json";

/// One archive in a partition's `diagnosis_keys/list.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleIndexEntry {
    pub region: String,
    pub url: String,
    pub created: i64,
}

/// One document in a partition's `exposure_data/list.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposureDataIndexEntry {
    pub url: String,
    pub created: i64,
}

/// `<base_path>/<partition>/<kind>`
pub fn partition_dir(base_path: &Path, partition: &PartitionKey, kind: &str) -> PathBuf {
    base_path.join(partition.relative_path()).join(kind)
}

/// `<base_url>/<kind>/<partition>/<file_name>`
pub fn public_url(base_url: &str, kind: &str, partition: &PartitionKey, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        kind,
        partition,
        file_name
    )
}

/// Files in `dir` with the given extension and their mtime in epoch seconds
///
/// A missing directory yields an empty list.
fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<(String, i64)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let created = entry
            .metadata()?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        files.push((name.to_string(), created));
    }
    Ok(files)
}

/// Archives of a partition, oldest first
pub fn bundle_index(
    base_path: &Path,
    base_url: &str,
    partition: &PartitionKey,
) -> Result<Vec<BundleIndexEntry>> {
    let dir = partition_dir(base_path, partition, DIAGNOSIS_KEYS_DIR);
    let mut files = files_with_extension(&dir, "zip")?;
    files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    Ok(files
        .into_iter()
        .map(|(name, created)| BundleIndexEntry {
            region: partition.to_string(),
            url: public_url(base_url, DIAGNOSIS_KEYS_DIR, partition, &name),
            created,
        })
        .collect())
}

/// Exposure data documents of a partition, newest first
pub fn exposure_data_index(
    base_path: &Path,
    base_url: &str,
    partition: &PartitionKey,
) -> Result<Vec<ExposureDataIndexEntry>> {
    let dir = partition_dir(base_path, partition, EXPOSURE_DATA_DIR);
    let mut files = files_with_extension(&dir, "json")?;
    files.retain(|(name, _)| name != INDEX_FILE_NAME);
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(files
        .into_iter()
        .map(|(name, created)| ExposureDataIndexEntry {
            url: public_url(base_url, EXPOSURE_DATA_DIR, partition, &name),
            created,
        })
        .collect())
}

/// Writes `entries` as pretty JSON to `<dir>/list.json`
pub fn write_index<T: Serialize>(dir: &Path, entries: &[T]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(INDEX_FILE_NAME);
    fs::write(&path, serde_json::to_vec_pretty(entries)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_public_url_layout() {
        let partition = PartitionKey::new("JP", Some("13".to_string())).unwrap();
        assert_eq!(
            public_url("https://cdn.example.com/", DIAGNOSIS_KEYS_DIR, &partition, "a.zip"),
            "https://cdn.example.com/diagnosis_keys/JP/13/a.zip"
        );
    }

    #[test]
    fn test_missing_directory_is_empty_index() {
        let temp = TempDir::new().unwrap();
        let partition = PartitionKey::cluster("123456").unwrap();
        assert!(bundle_index(temp.path(), "https://x", &partition).unwrap().is_empty());
        assert!(exposure_data_index(temp.path(), "https://x", &partition)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_bundle_index_lists_only_archives() {
        let temp = TempDir::new().unwrap();
        let partition = PartitionKey::cluster("123456").unwrap();
        let dir = partition_dir(temp.path(), &partition, DIAGNOSIS_KEYS_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("diagnosis_keys-a.zip"), b"zip").unwrap();
        fs::write(dir.join("notes.txt"), b"txt").unwrap();

        let entries = bundle_index(temp.path(), "https://x", &partition).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].region, "123456");
        assert_eq!(entries[0].url, "https://x/diagnosis_keys/123456/diagnosis_keys-a.zip");
        assert!(entries[0].created > 0);

        let path = write_index(&dir, &entries).unwrap();
        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(written[0]["region"], "123456");
    }
}
