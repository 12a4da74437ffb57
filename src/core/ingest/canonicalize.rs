//! Key canonicalization
//!
//! Turns a raw submitted key into a [`DiagnosisKeyRecord`] for one partition:
//! decodes the key material, resolves defaults and derives the dedup key.

use crate::domain::diagnosis_key::{
    DiagnosisKeyRecord, ReportType, DAYS_SINCE_ONSET_UNKNOWN, KEY_LENGTH, MAX_ROLLING_PERIOD,
    ROLLING_WINDOW_SECONDS, SECONDS_PER_DAY,
};
use crate::domain::ids::{DedupKey, IdempotencyKey, PartitionKey};
use crate::domain::submission::{OnsetSource, RawKey, Submission, TransmissionRisk};
use crate::domain::{Result, TekError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::convert::TryFrom;

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Values shared by every key of one upload
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub idempotency_key: &'a IdempotencyKey,
    pub onset_date: Option<DateTime<Utc>>,
    /// Receipt time in epoch seconds
    pub received_at: i64,
    pub default_transmission_risk: i32,
}

impl<'a> KeyContext<'a> {
    pub fn for_submission(
        submission: &'a Submission,
        received_at: i64,
        default_transmission_risk: i32,
    ) -> Self {
        Self {
            idempotency_key: &submission.idempotency_key,
            onset_date: submission.onset_date,
            received_at,
            default_transmission_risk,
        }
    }
}

/// Days between symptom onset and the start of the key's rolling window
///
/// Floor division, so keys that start before the onset day get negative values.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use tek_exporter::core::ingest::canonicalize::days_since_onset;
///
/// let onset = Utc.with_ymd_and_hms(2020, 5, 20, 0, 0, 0).unwrap();
/// // 2020-05-22T00:00:00Z
/// assert_eq!(days_since_onset(2_650_176, onset).unwrap(), 2);
/// // 2020-05-19T12:00:00Z
/// assert_eq!(days_since_onset(2_649_816, onset).unwrap(), -1);
/// ```
pub fn days_since_onset(rolling_start_number: i32, onset: DateTime<Utc>) -> Result<i32> {
    let window_start = i64::from(rolling_start_number) * ROLLING_WINDOW_SECONDS * MICROS_PER_SECOND;
    let days = (window_start - onset.timestamp_micros())
        .div_euclid(SECONDS_PER_DAY * MICROS_PER_SECOND);

    i32::try_from(days).map_err(|_| {
        TekError::Validation(format!(
            "Days since onset out of range for rolling start number {rolling_start_number}"
        ))
    })
}

/// Decodes base64 key material, requiring exactly 16 bytes
pub fn decode_key(key: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(key)
        .map_err(|e| TekError::Validation(format!("Key is not valid base64: {e}")))?;

    if bytes.len() != KEY_LENGTH {
        return Err(TekError::Validation(format!(
            "Key must decode to {KEY_LENGTH} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Canonicalizes one submitted key for one partition
///
/// # Errors
///
/// Returns [`TekError::Validation`] when the key material, rolling window or
/// report type is out of range. One bad key rejects the whole upload.
pub fn canonicalize(
    raw: &RawKey,
    partition: &PartitionKey,
    context: &KeyContext<'_>,
) -> Result<DiagnosisKeyRecord> {
    let key_data = decode_key(&raw.key)?;

    if raw.rolling_start_number < 0 {
        return Err(TekError::Validation(format!(
            "Rolling start number must not be negative, got {}",
            raw.rolling_start_number
        )));
    }
    if !(1..=MAX_ROLLING_PERIOD).contains(&raw.rolling_period) {
        return Err(TekError::Validation(format!(
            "Rolling period must be between 1 and {MAX_ROLLING_PERIOD}, got {}",
            raw.rolling_period
        )));
    }
    let report_type = ReportType::try_from(raw.report_type).map_err(TekError::Validation)?;

    let days = match OnsetSource::resolve(raw.days_since_onset_of_symptoms, context.onset_date) {
        OnsetSource::Reported(days) => days,
        OnsetSource::FromOnsetDate(onset) => days_since_onset(raw.rolling_start_number, onset)?,
        OnsetSource::Unknown => DAYS_SINCE_ONSET_UNKNOWN,
    };
    let risk = TransmissionRisk::resolve(raw.transmission_risk)
        .level(context.default_transmission_risk);

    let dedup_key = DedupKey::compose(
        context.idempotency_key,
        partition,
        &raw.key,
        raw.rolling_start_number,
        raw.rolling_period,
    );

    DiagnosisKeyRecord::builder()
        .partition(partition.clone())
        .key_data(key_data)
        .rolling_start_number(raw.rolling_start_number)
        .rolling_period(raw.rolling_period)
        .report_type(report_type)
        .transmission_risk_level(risk)
        .days_since_onset_of_symptoms(days)
        .created_at(context.received_at)
        .dedup_key(dedup_key)
        .build()
        .map_err(TekError::Validation)
}

/// Canonicalizes every key of a submission for every target partition
///
/// Records are ordered partition by partition, keys in submission order.
pub fn canonicalize_submission(
    submission: &Submission,
    context: &KeyContext<'_>,
) -> Result<Vec<DiagnosisKeyRecord>> {
    let mut records = Vec::with_capacity(submission.partitions.len() * submission.keys.len());
    for partition in &submission.partitions {
        for raw in &submission.keys {
            records.push(canonicalize(raw, partition, context)?);
        }
    }
    Ok(records)
}
