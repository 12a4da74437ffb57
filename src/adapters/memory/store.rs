//! In-memory key store
//!
//! Keeps every record behind a mutex. Used by the test suites and by
//! library callers that want to run the pipeline without a database.

use crate::adapters::database::traits::{
    BulkInsertResult, ExportSession, KeyStore, PartitionStatus,
};
use crate::core::ingest::dedup::is_equivalent;
use crate::domain::diagnosis_key::DiagnosisKeyRecord;
use crate::domain::ids::{DedupScope, PartitionKey};
use crate::domain::{Result, TekError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    records: Vec<DiagnosisKeyRecord>,
    exported_at: HashMap<i64, DateTime<Utc>>,
}

/// Key store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    state: Arc<Mutex<State>>,
    locked_partitions: Arc<Mutex<HashSet<PartitionKey>>>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record in id order
    pub fn records(&self) -> Result<Vec<DiagnosisKeyRecord>> {
        Ok(lock(&self.state)?.records.clone())
    }

    /// Makes every subsequent session commit fail, leaving rows unexported
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| TekError::Database("In-memory store lock poisoned".to_string()))
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn find_keys(
        &self,
        partition: &PartitionKey,
        key_data: &[u8],
    ) -> Result<Vec<DiagnosisKeyRecord>> {
        let state = lock(&self.state)?;
        Ok(state
            .records
            .iter()
            .filter(|r| &r.partition == partition && r.key_data == key_data)
            .cloned()
            .collect())
    }

    async fn exists(
        &self,
        partition: &PartitionKey,
        record: &DiagnosisKeyRecord,
        scope: DedupScope,
    ) -> Result<bool> {
        let state = lock(&self.state)?;
        Ok(state
            .records
            .iter()
            .any(|stored| &stored.partition == partition && is_equivalent(scope, stored, record)))
    }

    async fn insert_new_keys(
        &self,
        records: Vec<DiagnosisKeyRecord>,
        scope: DedupScope,
        dry_run: bool,
    ) -> Result<BulkInsertResult> {
        // One guard for check and insert keeps the upload atomic.
        let mut state = lock(&self.state)?;
        let mut result = BulkInsertResult::default();
        let mut staged: Vec<DiagnosisKeyRecord> = Vec::new();

        for mut record in records {
            let duplicate = state
                .records
                .iter()
                .chain(staged.iter())
                .any(|stored| {
                    is_equivalent(scope, stored, &record) || stored.dedup_key == record.dedup_key
                });
            if duplicate {
                result.duplicates_skipped += 1;
                continue;
            }

            if !dry_run {
                state.next_id += 1;
                record.id = Some(state.next_id);
            }
            staged.push(record);
        }

        if dry_run {
            tracing::info!(count = staged.len(), "DRY RUN: Would insert keys into memory store");
        } else {
            state.records.extend(staged.iter().cloned());
        }

        result.inserted = staged;
        Ok(result)
    }

    async fn pending_partitions(&self) -> Result<Vec<PartitionKey>> {
        let state = lock(&self.state)?;
        let mut partitions: Vec<PartitionKey> = state
            .records
            .iter()
            .filter(|r| !r.exported)
            .map(|r| r.partition.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        partitions.sort();
        Ok(partitions)
    }

    async fn begin_export(
        &self,
        partition: &PartitionKey,
    ) -> Result<Option<Box<dyn ExportSession>>> {
        if !lock(&self.locked_partitions)?.insert(partition.clone()) {
            return Ok(None);
        }

        let records: Vec<DiagnosisKeyRecord> = {
            let state = lock(&self.state)?;
            state
                .records
                .iter()
                .filter(|r| &r.partition == partition && !r.exported)
                .cloned()
                .collect()
        };

        Ok(Some(Box::new(MemoryExportSession {
            partition: partition.clone(),
            records,
            state: Arc::clone(&self.state),
            locked_partitions: Arc::clone(&self.locked_partitions),
            fail_commits: Arc::clone(&self.fail_commits),
        })))
    }

    async fn partition_status(
        &self,
        partition: Option<&PartitionKey>,
    ) -> Result<Vec<PartitionStatus>> {
        let state = lock(&self.state)?;
        let mut by_partition: BTreeMap<PartitionKey, PartitionStatus> = BTreeMap::new();

        for record in state
            .records
            .iter()
            .filter(|r| partition.map_or(true, |p| &r.partition == p))
        {
            let status = by_partition
                .entry(record.partition.clone())
                .or_insert_with(|| PartitionStatus {
                    partition: record.partition.clone(),
                    total_keys: 0,
                    pending_keys: 0,
                    last_created_at: None,
                    last_exported_at: None,
                });

            status.total_keys += 1;
            if !record.exported {
                status.pending_keys += 1;
            }
            status.last_created_at = status.last_created_at.max(Some(record.created_at));
            let exported_at = record.id.and_then(|id| state.exported_at.get(&id)).copied();
            status.last_exported_at = status.last_exported_at.max(exported_at);
        }

        Ok(by_partition.into_values().collect())
    }
}

struct MemoryExportSession {
    partition: PartitionKey,
    records: Vec<DiagnosisKeyRecord>,
    state: Arc<Mutex<State>>,
    locked_partitions: Arc<Mutex<HashSet<PartitionKey>>>,
    fail_commits: Arc<AtomicBool>,
}

#[async_trait]
impl ExportSession for MemoryExportSession {
    fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    fn records(&self) -> &[DiagnosisKeyRecord] {
        &self.records
    }

    async fn commit(self: Box<Self>, ids: &[i64]) -> Result<u64> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(TekError::Database(format!(
                "Simulated commit failure for partition {}",
                self.partition
            )));
        }

        let now = Utc::now();
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let mut state = lock(&self.state)?;
        let mut flipped = Vec::new();

        for record in state.records.iter_mut() {
            let Some(id) = record.id else { continue };
            if record.partition == self.partition && !record.exported && wanted.contains(&id) {
                record.exported = true;
                flipped.push(id);
            }
        }
        for id in &flipped {
            state.exported_at.insert(*id, now);
        }

        Ok(flipped.len() as u64)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl Drop for MemoryExportSession {
    fn drop(&mut self) {
        if let Ok(mut locked) = self.locked_partitions.lock() {
            locked.remove(&self.partition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::DedupKey;

    fn record(partition: &str, key_byte: u8, token: &str) -> DiagnosisKeyRecord {
        DiagnosisKeyRecord::builder()
            .partition(PartitionKey::cluster(partition).unwrap())
            .key_data(vec![key_byte; 16])
            .rolling_start_number(2_650_000)
            .rolling_period(144)
            .created_at(1_590_000_000 + key_byte as i64)
            .dedup_key(DedupKey::from_storage(format!("{token},{partition},{key_byte}")))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_usable_as_shared_key_store() {
        let store: Arc<dyn KeyStore + Send + Sync> = Arc::new(MemoryKeyStore::new());
        assert_eq!(store.backend_name(), "memory");
        store.test_connection().await.unwrap();
        assert!(store.pending_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_skips_duplicates() {
        let store = MemoryKeyStore::new();
        let result = store
            .insert_new_keys(
                vec![record("123456", 1, "a"), record("123456", 2, "a")],
                DedupScope::KeyMaterial,
                false,
            )
            .await
            .unwrap();
        assert_eq!(result.inserted_count(), 2);
        assert_eq!(result.inserted[0].id, Some(1));
        assert_eq!(result.inserted[1].id, Some(2));

        let again = store
            .insert_new_keys(vec![record("123456", 1, "b")], DedupScope::KeyMaterial, false)
            .await
            .unwrap();
        assert_eq!(again.inserted_count(), 0);
        assert_eq!(again.duplicates_skipped, 1);

        let other_scope = store
            .insert_new_keys(vec![record("123456", 1, "b")], DedupScope::DedupKey, false)
            .await
            .unwrap();
        assert_eq!(other_scope.inserted_count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = MemoryKeyStore::new();
        let result = store
            .insert_new_keys(vec![record("123456", 1, "a")], DedupScope::KeyMaterial, true)
            .await
            .unwrap();
        assert_eq!(result.inserted_count(), 1);
        assert!(result.inserted[0].id.is_none());
        assert!(store.records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exists_and_find_keys() {
        let store = MemoryKeyStore::new();
        let stored = record("123456", 1, "a");
        store
            .insert_new_keys(vec![stored.clone()], DedupScope::KeyMaterial, false)
            .await
            .unwrap();

        let partition = PartitionKey::cluster("123456").unwrap();
        let other = PartitionKey::cluster("654321").unwrap();
        assert!(store
            .exists(&partition, &record("123456", 1, "z"), DedupScope::KeyMaterial)
            .await
            .unwrap());
        assert!(!store
            .exists(&other, &record("654321", 1, "z"), DedupScope::KeyMaterial)
            .await
            .unwrap());

        let found = store.find_keys(&partition, &[1u8; 16]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.find_keys(&partition, &[9u8; 16]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_session_commit_and_lock() {
        let store = MemoryKeyStore::new();
        store
            .insert_new_keys(
                vec![record("123456", 1, "a"), record("654321", 2, "a")],
                DedupScope::KeyMaterial,
                false,
            )
            .await
            .unwrap();

        let partition = PartitionKey::cluster("123456").unwrap();
        let session = store.begin_export(&partition).await.unwrap().unwrap();
        assert_eq!(session.records().len(), 1);

        // A second exporter cannot take the same partition.
        assert!(store.begin_export(&partition).await.unwrap().is_none());

        let ids: Vec<i64> = session.records().iter().filter_map(|r| r.id).collect();
        assert_eq!(session.commit(&ids).await.unwrap(), 1);

        let session = store.begin_export(&partition).await.unwrap().unwrap();
        assert!(session.records().is_empty());
        session.rollback().await.unwrap();

        let pending = store.pending_partitions().await.unwrap();
        assert_eq!(pending, vec![PartitionKey::cluster("654321").unwrap()]);

        let status = store.partition_status(Some(&partition)).await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].pending_keys, 0);
        assert_eq!(status[0].exported_keys(), 1);
        assert!(status[0].last_exported_at.is_some());
    }

    #[tokio::test]
    async fn test_dropped_session_leaves_records_unexported() {
        let store = MemoryKeyStore::new();
        store
            .insert_new_keys(vec![record("123456", 1, "a")], DedupScope::KeyMaterial, false)
            .await
            .unwrap();

        let partition = PartitionKey::cluster("123456").unwrap();
        let session = store.begin_export(&partition).await.unwrap().unwrap();
        drop(session);

        let session = store.begin_export(&partition).await.unwrap().unwrap();
        assert_eq!(session.records().len(), 1);
    }
}
