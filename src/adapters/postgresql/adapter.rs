//! PostgreSQL adapter implementing the key store traits

use crate::adapters::database::traits::{
    BulkInsertResult, ExportSession, KeyStore, PartitionStatus,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{PostgreSQLDiagnosisKey, KEY_COLUMNS};
use crate::core::ingest::dedup::is_equivalent;
use crate::domain::diagnosis_key::DiagnosisKeyRecord;
use crate::domain::ids::{DedupScope, PartitionKey};
use crate::domain::{Result, TekError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Advisory lock class held by an export session
const EXPORT_LOCK_CLASS: i32 = 1;

/// Advisory lock class held while one upload is checked and inserted
const INGEST_LOCK_CLASS: i32 = 2;

const INSERT_KEY: &str = r#"
    INSERT INTO diagnosis_keys (
        region, sub_region, key_data, rolling_start_number, rolling_period,
        report_type, transmission_risk, days_since_onset_of_symptoms,
        created_at, exported, dedup_key
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (dedup_key) DO NOTHING
    RETURNING id
"#;

/// PostgreSQL implementation of [`KeyStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

async fn exists_in(
    tx: &tokio_postgres::Transaction<'_>,
    partition: &PartitionKey,
    record: &DiagnosisKeyRecord,
    scope: DedupScope,
) -> Result<bool> {
    let row = match scope {
        DedupScope::KeyMaterial => {
            tx.query_one(
                "SELECT EXISTS (SELECT 1 FROM diagnosis_keys \
                 WHERE region = $1 AND sub_region = $2 AND key_data = $3)",
                &[
                    &partition.region(),
                    &partition.storage_sub_region(),
                    &record.key_data,
                ],
            )
            .await?
        }
        DedupScope::DedupKey => {
            tx.query_one(
                "SELECT EXISTS (SELECT 1 FROM diagnosis_keys \
                 WHERE region = $1 AND sub_region = $2 AND dedup_key = $3)",
                &[
                    &partition.region(),
                    &partition.storage_sub_region(),
                    &record.dedup_key.as_str(),
                ],
            )
            .await?
        }
    };
    Ok(row.try_get(0)?)
}

#[async_trait]
impl KeyStore for PostgreSQLAdapter {
    fn backend_name(&self) -> &str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.run_migrations().await
    }

    async fn find_keys(
        &self,
        partition: &PartitionKey,
        key_data: &[u8],
    ) -> Result<Vec<DiagnosisKeyRecord>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM diagnosis_keys \
                     WHERE region = $1 AND sub_region = $2 AND key_data = $3 ORDER BY id"
                ),
                &[&partition.region(), &partition.storage_sub_region(), &key_data],
            )
            .await?;

        rows.iter()
            .map(|row| PostgreSQLDiagnosisKey::from_row(row)?.into_domain())
            .collect()
    }

    async fn exists(
        &self,
        partition: &PartitionKey,
        record: &DiagnosisKeyRecord,
        scope: DedupScope,
    ) -> Result<bool> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await?;
        let found = exists_in(&tx, partition, record, scope).await?;
        tx.commit().await?;
        Ok(found)
    }

    async fn insert_new_keys(
        &self,
        records: Vec<DiagnosisKeyRecord>,
        scope: DedupScope,
        dry_run: bool,
    ) -> Result<BulkInsertResult> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await?;

        // Serializes concurrent uploads per partition; sorted to avoid lock-order deadlocks.
        let partitions: BTreeSet<String> = records.iter().map(|r| r.partition.to_string()).collect();
        for partition in &partitions {
            tx.execute(
                "SELECT pg_advisory_xact_lock($1, hashtext($2))",
                &[&INGEST_LOCK_CLASS, partition],
            )
            .await?;
        }

        let mut result = BulkInsertResult::default();
        let mut staged: Vec<DiagnosisKeyRecord> = Vec::new();

        for mut record in records {
            let partition = record.partition.clone();
            let repeated = staged
                .iter()
                .any(|s| is_equivalent(scope, s, &record) || s.dedup_key == record.dedup_key);
            if repeated || exists_in(&tx, &partition, &record, scope).await? {
                result.duplicates_skipped += 1;
                continue;
            }

            if dry_run {
                staged.push(record);
                continue;
            }

            let row = PostgreSQLDiagnosisKey::from_domain(&record);
            let inserted = tx
                .query_opt(
                    INSERT_KEY,
                    &[
                        &row.region,
                        &row.sub_region,
                        &row.key_data,
                        &row.rolling_start_number,
                        &row.rolling_period,
                        &row.report_type,
                        &row.transmission_risk,
                        &row.days_since_onset_of_symptoms,
                        &row.created_at,
                        &row.exported,
                        &row.dedup_key,
                    ],
                )
                .await?;

            match inserted {
                Some(returned) => {
                    record.id = Some(returned.try_get(0)?);
                    staged.push(record);
                }
                None => result.duplicates_skipped += 1,
            }
        }

        if dry_run {
            tracing::info!(
                count = staged.len(),
                "DRY RUN: Would insert keys into PostgreSQL"
            );
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }

        result.inserted = staged;
        Ok(result)
    }

    async fn pending_partitions(&self) -> Result<Vec<PartitionKey>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                "SELECT DISTINCT region, sub_region FROM diagnosis_keys \
                 WHERE exported = FALSE ORDER BY region, sub_region",
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| {
                PartitionKey::from_storage(row.try_get("region")?, row.try_get("sub_region")?)
                    .map_err(|e| TekError::Database(format!("Corrupt partition in row: {e}")))
            })
            .collect()
    }

    async fn begin_export(
        &self,
        partition: &PartitionKey,
    ) -> Result<Option<Box<dyn ExportSession>>> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute("BEGIN").await?;

        // From here on a failed step drops the session, which discards the connection.
        let mut session = PgExportSession {
            partition: partition.clone(),
            records: Vec::new(),
            conn: Some(conn),
            finished: false,
        };

        let locked: bool = session
            .conn()?
            .query_one(
                "SELECT pg_try_advisory_xact_lock($1, hashtext($2))",
                &[&EXPORT_LOCK_CLASS, &partition.to_string()],
            )
            .await?
            .try_get(0)?;

        if !locked {
            Box::new(session).rollback().await?;
            return Ok(None);
        }

        let rows = session
            .conn()?
            .query(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM diagnosis_keys \
                     WHERE region = $1 AND sub_region = $2 AND exported = FALSE \
                     ORDER BY id FOR UPDATE"
                ),
                &[&partition.region(), &partition.storage_sub_region()],
            )
            .await?;

        session.records = rows
            .iter()
            .map(|row| PostgreSQLDiagnosisKey::from_row(row)?.into_domain())
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Box::new(session)))
    }

    async fn partition_status(
        &self,
        partition: Option<&PartitionKey>,
    ) -> Result<Vec<PartitionStatus>> {
        let conn = self.client.get_connection().await?;
        let select = "SELECT region, sub_region, COUNT(*) AS total, \
                      COUNT(*) FILTER (WHERE NOT exported) AS pending, \
                      MAX(created_at) AS last_created_at, MAX(exported_at) AS last_exported_at \
                      FROM diagnosis_keys";

        let rows = match partition {
            Some(p) => {
                conn.query(
                    &format!(
                        "{select} WHERE region = $1 AND sub_region = $2 \
                         GROUP BY region, sub_region"
                    ),
                    &[&p.region(), &p.storage_sub_region()],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("{select} GROUP BY region, sub_region ORDER BY region, sub_region"),
                    &[],
                )
                .await?
            }
        };

        rows.iter()
            .map(|row| {
                let partition =
                    PartitionKey::from_storage(row.try_get("region")?, row.try_get("sub_region")?)
                        .map_err(|e| TekError::Database(format!("Corrupt partition in row: {e}")))?;
                let total: i64 = row.try_get("total")?;
                let pending: i64 = row.try_get("pending")?;
                Ok(PartitionStatus {
                    partition,
                    total_keys: total.max(0) as u64,
                    pending_keys: pending.max(0) as u64,
                    last_created_at: row.try_get("last_created_at")?,
                    last_exported_at: row.try_get("last_exported_at")?,
                })
            })
            .collect()
    }
}

/// Export session holding one pooled connection inside an open transaction
struct PgExportSession {
    partition: PartitionKey,
    records: Vec<DiagnosisKeyRecord>,
    conn: Option<deadpool_postgres::Object>,
    finished: bool,
}

impl PgExportSession {
    fn conn(&self) -> Result<&deadpool_postgres::Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| TekError::Database("Export session already closed".to_string()))
    }
}

#[async_trait]
impl ExportSession for PgExportSession {
    fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    fn records(&self) -> &[DiagnosisKeyRecord] {
        &self.records
    }

    async fn commit(self: Box<Self>, ids: &[i64]) -> Result<u64> {
        let mut session = self;
        let conn = session.conn()?;

        let updated = conn
            .execute(
                "UPDATE diagnosis_keys SET exported = TRUE, exported_at = now() \
                 WHERE id = ANY($1) AND region = $2 AND sub_region = $3 AND exported = FALSE",
                &[
                    &ids,
                    &session.partition.region(),
                    &session.partition.storage_sub_region(),
                ],
            )
            .await?;
        conn.batch_execute("COMMIT").await?;

        session.finished = true;
        Ok(updated)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut session = self;
        session.conn()?.batch_execute("ROLLBACK").await?;
        session.finished = true;
        Ok(())
    }
}

impl Drop for PgExportSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                partition = %self.partition,
                "Export session ended without commit, discarding its connection"
            );
            // Detached from the pool; closing it makes the server roll back.
            drop(deadpool_postgres::Object::take(conn));
        }
    }
}
