//! Upload payload types
//!
//! A key upload arrives in one of two JSON shapes. Both are resolved once at
//! the boundary into a [`Submission`], so nothing downstream branches on which
//! fields happened to be present.

use super::errors::TekError;
use super::ids::{IdempotencyKey, PartitionKey, PartitionScheme};
use super::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback format for onset dates with a `+0000` style offset
const ONSET_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// One raw key object as submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKey {
    /// Base64 key material
    pub key: String,
    pub report_type: i32,
    pub rolling_start_number: i32,
    pub rolling_period: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_risk: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_onset_of_symptoms: Option<i32>,
}

/// Keys for a single partition named by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePartitionUpload {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub symptom_onset_date: Option<String>,
    pub temporary_exposure_keys: Vec<RawKey>,
}

/// Keys fanned out over every region and sub-region listed in the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPartitionUpload {
    #[serde(default, rename = "idempotencyKey")]
    pub idempotency_key: Option<String>,
    #[serde(default, rename = "symptomOnsetDate")]
    pub symptom_onset_date: Option<String>,
    pub keys: Vec<RawKey>,
    pub regions: Vec<String>,
    #[serde(default)]
    pub sub_regions: Vec<String>,
}

/// A key upload in either accepted shape
#[derive(Debug, Clone)]
pub enum UploadPayload {
    SinglePartition(SinglePartitionUpload),
    MultiPartition(MultiPartitionUpload),
}

impl UploadPayload {
    /// Parses an upload body
    ///
    /// # Errors
    ///
    /// Returns [`TekError::Validation`] for malformed JSON, a missing required
    /// field, or a body that matches neither shape.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| TekError::Validation(format!("Malformed upload JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| TekError::Validation("Upload must be a JSON object".to_string()))?;

        if object.contains_key("temporaryExposureKeys") {
            serde_json::from_value(value)
                .map(UploadPayload::SinglePartition)
                .map_err(|e| TekError::Validation(format!("Invalid upload: {e}")))
        } else if object.contains_key("keys") {
            serde_json::from_value(value)
                .map(UploadPayload::MultiPartition)
                .map_err(|e| TekError::Validation(format!("Invalid upload: {e}")))
        } else {
            Err(TekError::Validation(
                "Upload must contain either `temporaryExposureKeys` or `keys`".to_string(),
            ))
        }
    }

    /// Resolves the payload into a [`Submission`]
    ///
    /// `partition` is required for single-partition uploads and ignored for
    /// multi-partition ones. A missing idempotency token is generated here.
    pub fn into_submission(
        self,
        partition: Option<PartitionKey>,
        scheme: PartitionScheme,
    ) -> Result<Submission> {
        let (token, onset, partitions, keys) = match self {
            UploadPayload::SinglePartition(upload) => {
                let partition = partition.ok_or_else(|| {
                    TekError::Validation(
                        "A partition is required for `temporaryExposureKeys` uploads".to_string(),
                    )
                })?;
                (
                    upload.idempotency_key,
                    upload.symptom_onset_date,
                    vec![partition],
                    upload.temporary_exposure_keys,
                )
            }
            UploadPayload::MultiPartition(upload) => {
                let partitions = expand_partitions(&upload.regions, &upload.sub_regions, scheme)?;
                (
                    upload.idempotency_key,
                    upload.symptom_onset_date,
                    partitions,
                    upload.keys,
                )
            }
        };

        let idempotency_key = match token {
            Some(token) => IdempotencyKey::new(token).map_err(TekError::Validation)?,
            None => IdempotencyKey::generate(),
        };

        let onset_date = onset.as_deref().map(parse_onset_date).transpose()?;

        Ok(Submission {
            idempotency_key,
            onset_date,
            partitions,
            keys,
        })
    }
}

/// Cross product of regions with the listed sub-regions plus region level
fn expand_partitions(
    regions: &[String],
    sub_regions: &[String],
    scheme: PartitionScheme,
) -> Result<Vec<PartitionKey>> {
    if regions.is_empty() {
        return Err(TekError::Validation("`regions` cannot be empty".to_string()));
    }

    let mut partitions: Vec<PartitionKey> = Vec::new();
    for region in regions {
        let candidates = match scheme {
            PartitionScheme::Cluster => {
                if sub_regions.iter().any(|s| !s.is_empty()) {
                    return Err(TekError::Validation(
                        "Sub-regions are not supported with cluster partitions".to_string(),
                    ));
                }
                vec![PartitionKey::cluster(region.clone())]
            }
            PartitionScheme::Region => sub_regions
                .iter()
                .map(|sub| PartitionKey::new(region.clone(), Some(sub.clone())))
                .chain(std::iter::once(PartitionKey::new(region.clone(), None)))
                .collect(),
        };

        for candidate in candidates {
            let partition = candidate.map_err(TekError::Validation)?;
            if !partitions.contains(&partition) {
                partitions.push(partition);
            }
        }
    }

    Ok(partitions)
}

/// Parses `symptomOnsetDate` (RFC 3339, fractional seconds allowed)
pub fn parse_onset_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, ONSET_DATE_FORMAT))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TekError::Validation(format!("Invalid symptomOnsetDate '{value}': {e}")))
}

/// A resolved upload, ready for canonicalization
#[derive(Debug, Clone)]
pub struct Submission {
    pub idempotency_key: IdempotencyKey,
    pub onset_date: Option<DateTime<Utc>>,
    pub partitions: Vec<PartitionKey>,
    pub keys: Vec<RawKey>,
}

/// Where a key's days-since-onset value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnsetSource {
    /// Supplied by the client on the key itself
    Reported(i32),
    /// Derived from the submission's symptom onset date
    FromOnsetDate(DateTime<Utc>),
    /// Neither available
    Unknown,
}

impl OnsetSource {
    /// Chooses the source for one key, preferring a reported value
    pub fn resolve(reported: Option<i32>, onset_date: Option<DateTime<Utc>>) -> Self {
        match (reported, onset_date) {
            (Some(days), _) => OnsetSource::Reported(days),
            (None, Some(date)) => OnsetSource::FromOnsetDate(date),
            (None, None) => OnsetSource::Unknown,
        }
    }
}

/// Where a key's transmission risk comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionRisk {
    Submitted(i32),
    Default,
}

impl TransmissionRisk {
    pub fn resolve(submitted: Option<i32>) -> Self {
        submitted.map_or(TransmissionRisk::Default, TransmissionRisk::Submitted)
    }

    /// Returns the effective level given the configured default
    pub fn level(self, default: i32) -> i32 {
        match self {
            TransmissionRisk::Submitted(level) => level,
            TransmissionRisk::Default => default,
        }
    }
}
