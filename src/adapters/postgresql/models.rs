//! PostgreSQL row models
//!
//! Maps rows of the `diagnosis_keys` table to and from the domain record.

use crate::domain::diagnosis_key::{DiagnosisKeyRecord, ReportType};
use crate::domain::ids::{DedupKey, PartitionKey};
use crate::domain::{Result, TekError};
use std::convert::TryFrom;
use tokio_postgres::Row;

/// Column list shared by every `SELECT` of full records
pub const KEY_COLUMNS: &str = "id, region, sub_region, key_data, rolling_start_number, \
     rolling_period, report_type, transmission_risk, days_since_onset_of_symptoms, \
     created_at, exported, dedup_key";

/// One row of the `diagnosis_keys` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgreSQLDiagnosisKey {
    pub id: Option<i64>,
    pub region: String,
    /// Empty for region-level partitions
    pub sub_region: String,
    pub key_data: Vec<u8>,
    pub rolling_start_number: i32,
    pub rolling_period: i32,
    pub report_type: i32,
    pub transmission_risk: i32,
    pub days_since_onset_of_symptoms: i32,
    pub created_at: i64,
    pub exported: bool,
    pub dedup_key: String,
}

impl PostgreSQLDiagnosisKey {
    /// Reads a row selected with [`KEY_COLUMNS`]
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            region: row.try_get("region")?,
            sub_region: row.try_get("sub_region")?,
            key_data: row.try_get("key_data")?,
            rolling_start_number: row.try_get("rolling_start_number")?,
            rolling_period: row.try_get("rolling_period")?,
            report_type: row.try_get("report_type")?,
            transmission_risk: row.try_get("transmission_risk")?,
            days_since_onset_of_symptoms: row.try_get("days_since_onset_of_symptoms")?,
            created_at: row.try_get("created_at")?,
            exported: row.try_get("exported")?,
            dedup_key: row.try_get("dedup_key")?,
        })
    }

    /// Convert from the domain record
    pub fn from_domain(record: &DiagnosisKeyRecord) -> Self {
        Self {
            id: record.id,
            region: record.partition.region().to_string(),
            sub_region: record.partition.storage_sub_region().to_string(),
            key_data: record.key_data.clone(),
            rolling_start_number: record.rolling_start_number,
            rolling_period: record.rolling_period,
            report_type: record.report_type.as_i32(),
            transmission_risk: record.transmission_risk_level,
            days_since_onset_of_symptoms: record.days_since_onset_of_symptoms,
            created_at: record.created_at,
            exported: record.exported,
            dedup_key: record.dedup_key.as_str().to_string(),
        }
    }

    /// Convert to the domain record
    ///
    /// # Errors
    ///
    /// Returns [`TekError::Database`] when a stored value no longer passes
    /// domain validation.
    pub fn into_domain(self) -> Result<DiagnosisKeyRecord> {
        let partition = PartitionKey::from_storage(self.region, self.sub_region)
            .map_err(|e| TekError::Database(format!("Corrupt partition in row: {e}")))?;
        let report_type = ReportType::try_from(self.report_type)
            .map_err(|e| TekError::Database(format!("Corrupt report type in row: {e}")))?;

        let mut builder = DiagnosisKeyRecord::builder()
            .partition(partition)
            .key_data(self.key_data)
            .rolling_start_number(self.rolling_start_number)
            .rolling_period(self.rolling_period)
            .report_type(report_type)
            .transmission_risk_level(self.transmission_risk)
            .days_since_onset_of_symptoms(self.days_since_onset_of_symptoms)
            .created_at(self.created_at)
            .exported(self.exported)
            .dedup_key(DedupKey::from_storage(self.dedup_key));
        if let Some(id) = self.id {
            builder = builder.id(id);
        }

        builder
            .build()
            .map_err(|e| TekError::Database(format!("Corrupt diagnosis key row: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(partition: PartitionKey) -> DiagnosisKeyRecord {
        DiagnosisKeyRecord::builder()
            .id(7)
            .partition(partition)
            .key_data(vec![3u8; 16])
            .rolling_start_number(2_650_000)
            .rolling_period(144)
            .report_type(ReportType::SelfReport)
            .transmission_risk_level(6)
            .days_since_onset_of_symptoms(-2)
            .created_at(1_590_000_000)
            .dedup_key(DedupKey::from_storage("t,JP,,k,2650000,144".to_string()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_region_level_partition_maps_to_empty_sub_region() {
        let record = record(PartitionKey::new("JP", None).unwrap());
        let row = PostgreSQLDiagnosisKey::from_domain(&record);
        assert_eq!(row.region, "JP");
        assert_eq!(row.sub_region, "");
        assert_eq!(row.report_type, 3);

        assert_eq!(row.into_domain().unwrap(), record);
    }

    #[test]
    fn test_sub_region_partition_preserved() {
        let record = record(PartitionKey::new("JP", Some("13".to_string())).unwrap());
        let row = PostgreSQLDiagnosisKey::from_domain(&record);
        assert_eq!(row.sub_region, "13");
        assert_eq!(row.into_domain().unwrap().partition, record.partition);
    }

    #[test]
    fn test_corrupt_row_is_database_error() {
        let mut row = PostgreSQLDiagnosisKey::from_domain(&record(PartitionKey::cluster("123456").unwrap()));
        row.report_type = 42;
        assert!(matches!(row.into_domain(), Err(TekError::Database(_))));

        let mut row = PostgreSQLDiagnosisKey::from_domain(&record(PartitionKey::cluster("123456").unwrap()));
        row.key_data = vec![0u8; 8];
        assert!(matches!(row.into_domain(), Err(TekError::Database(_))));
    }
}
