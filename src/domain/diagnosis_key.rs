//! Diagnosis key domain model
//!
//! This module defines the stored form of a temporary exposure key after
//! canonicalization, together with the protocol constants that govern it.

use super::ids::{DedupKey, PartitionKey};
use std::convert::TryFrom;
use std::fmt;

/// Length of one rolling interval in seconds
pub const ROLLING_WINDOW_SECONDS: i64 = 600;

/// Seconds in one day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Transmission risk applied when the client does not submit one
pub const DEFAULT_TRANSMISSION_RISK: i32 = 4;

/// Sentinel for "days since onset of symptoms" when onset is unknown
pub const DAYS_SINCE_ONSET_UNKNOWN: i32 = i32::MAX;

/// Exact size of the key material in bytes
pub const KEY_LENGTH: usize = 16;

/// Largest valid rolling period (one day of rolling intervals)
pub const MAX_ROLLING_PERIOD: i32 = 144;

/// Diagnosis type attached to a key
///
/// Wire values follow the interoperable export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ReportType {
    #[default]
    Unknown = 0,
    ConfirmedTest = 1,
    ConfirmedClinicalDiagnosis = 2,
    SelfReport = 3,
    Recursive = 4,
    Revoked = 5,
}

impl ReportType {
    /// Returns the wire value
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for ReportType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReportType::Unknown),
            1 => Ok(ReportType::ConfirmedTest),
            2 => Ok(ReportType::ConfirmedClinicalDiagnosis),
            3 => Ok(ReportType::SelfReport),
            4 => Ok(ReportType::Recursive),
            5 => Ok(ReportType::Revoked),
            other => Err(format!("Invalid report type {other}: expected 0..=5")),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportType::Unknown => "UNKNOWN",
            ReportType::ConfirmedTest => "CONFIRMED_TEST",
            ReportType::ConfirmedClinicalDiagnosis => "CONFIRMED_CLINICAL_DIAGNOSIS",
            ReportType::SelfReport => "SELF_REPORT",
            ReportType::Recursive => "RECURSIVE",
            ReportType::Revoked => "REVOKED",
        };
        write!(f, "{name}")
    }
}

/// A canonical, storable diagnosis key
///
/// Created by the canonicalizer, persisted once per [`DedupKey`] and flipped
/// to `exported` exactly once by an export commit. There is no update path
/// for `key_data` or `created_at`.
///
/// # Examples
///
/// ```
/// use tek_exporter::domain::diagnosis_key::{DiagnosisKeyRecord, ReportType};
/// use tek_exporter::domain::ids::{DedupKey, PartitionKey};
///
/// let record = DiagnosisKeyRecord::builder()
///     .partition(PartitionKey::cluster("123456").unwrap())
///     .key_data(vec![0u8; 16])
///     .rolling_start_number(2_650_000)
///     .rolling_period(144)
///     .report_type(ReportType::ConfirmedTest)
///     .transmission_risk_level(4)
///     .days_since_onset_of_symptoms(0)
///     .created_at(1_590_000_000)
///     .dedup_key(DedupKey::from_storage("t,123456,,AAAA,2650000,144".to_string()))
///     .build()
///     .unwrap();
///
/// assert!(!record.exported);
/// assert!(record.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisKeyRecord {
    /// Storage-assigned identifier, `None` before insertion
    pub id: Option<i64>,

    /// Partition the key belongs to
    pub partition: PartitionKey,

    /// Raw key material
    pub key_data: Vec<u8>,

    /// Start of validity in 10-minute intervals since the Unix epoch
    pub rolling_start_number: i32,

    /// Validity length in 10-minute intervals
    pub rolling_period: i32,

    /// Diagnosis type
    pub report_type: ReportType,

    /// Submitted or default transmission risk
    pub transmission_risk_level: i32,

    /// Days between the key window and symptom onset
    pub days_since_onset_of_symptoms: i32,

    /// Receipt time in epoch seconds (server clock)
    pub created_at: i64,

    /// Whether the key has been included in a committed export
    pub exported: bool,

    /// Natural key used for deduplication
    pub dedup_key: DedupKey,
}

impl DiagnosisKeyRecord {
    /// Creates a new builder
    pub fn builder() -> DiagnosisKeyRecordBuilder {
        DiagnosisKeyRecordBuilder::default()
    }

    /// Whether the onset of symptoms is known for this key
    pub fn has_onset(&self) -> bool {
        self.days_since_onset_of_symptoms != DAYS_SINCE_ONSET_UNKNOWN
    }
}

/// Builder for [`DiagnosisKeyRecord`]
#[derive(Debug, Default)]
pub struct DiagnosisKeyRecordBuilder {
    id: Option<i64>,
    partition: Option<PartitionKey>,
    key_data: Option<Vec<u8>>,
    rolling_start_number: Option<i32>,
    rolling_period: Option<i32>,
    report_type: Option<ReportType>,
    transmission_risk_level: Option<i32>,
    days_since_onset_of_symptoms: Option<i32>,
    created_at: Option<i64>,
    exported: bool,
    dedup_key: Option<DedupKey>,
}

impl DiagnosisKeyRecordBuilder {
    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn partition(mut self, partition: PartitionKey) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn key_data(mut self, key_data: Vec<u8>) -> Self {
        self.key_data = Some(key_data);
        self
    }

    pub fn rolling_start_number(mut self, rolling_start_number: i32) -> Self {
        self.rolling_start_number = Some(rolling_start_number);
        self
    }

    pub fn rolling_period(mut self, rolling_period: i32) -> Self {
        self.rolling_period = Some(rolling_period);
        self
    }

    pub fn report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = Some(report_type);
        self
    }

    pub fn transmission_risk_level(mut self, level: i32) -> Self {
        self.transmission_risk_level = Some(level);
        self
    }

    pub fn days_since_onset_of_symptoms(mut self, days: i32) -> Self {
        self.days_since_onset_of_symptoms = Some(days);
        self
    }

    pub fn created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn dedup_key(mut self, dedup_key: DedupKey) -> Self {
        self.dedup_key = Some(dedup_key);
        self
    }

    /// Builds the record
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or the key material
    /// has the wrong length
    pub fn build(self) -> Result<DiagnosisKeyRecord, String> {
        let key_data = self.key_data.ok_or("key_data is required")?;
        if key_data.len() != KEY_LENGTH {
            return Err(format!(
                "key_data must be {KEY_LENGTH} bytes, got {}",
                key_data.len()
            ));
        }

        Ok(DiagnosisKeyRecord {
            id: self.id,
            partition: self.partition.ok_or("partition is required")?,
            key_data,
            rolling_start_number: self
                .rolling_start_number
                .ok_or("rolling_start_number is required")?,
            rolling_period: self.rolling_period.ok_or("rolling_period is required")?,
            report_type: self.report_type.unwrap_or_default(),
            transmission_risk_level: self
                .transmission_risk_level
                .unwrap_or(DEFAULT_TRANSMISSION_RISK),
            days_since_onset_of_symptoms: self
                .days_since_onset_of_symptoms
                .unwrap_or(DAYS_SINCE_ONSET_UNKNOWN),
            created_at: self.created_at.ok_or("created_at is required")?,
            exported: self.exported,
            dedup_key: self.dedup_key.ok_or("dedup_key is required")?,
        })
    }
}
