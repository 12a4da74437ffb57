//! "EK Export v1" wire format
//!
//! An `export.bin` is the 16-byte header followed by a protobuf
//! `TemporaryExposureKeyExport`. An `export.sig` is a bare `TEKSignatureList`.
//! The messages are declared inline; every field is proto2 `optional`.

use crate::domain::{Result, TekError};
use prost::Message;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed header in front of every export binary
pub const EXPORT_HEADER: &[u8; 16] = b"EK Export v1    ";

pub const EXPORT_BIN_FILE_NAME: &str = "export.bin";
pub const EXPORT_SIG_FILE_NAME: &str = "export.sig";

/// ECDSA P-256 with SHA-256
pub const SIGNATURE_ALGORITHM: &str = "1.2.840.10045.4.3.2";

pub const DEFAULT_VERIFICATION_KEY_VERSION: &str = "v1";

#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKeyExport {
    /// Earliest `created_at` in the batch, epoch seconds
    #[prost(fixed64, optional, tag = "1")]
    pub start_timestamp: Option<u64>,
    /// Latest `created_at` in the batch, epoch seconds
    #[prost(fixed64, optional, tag = "2")]
    pub end_timestamp: Option<u64>,
    #[prost(string, optional, tag = "3")]
    pub region: Option<String>,
    #[prost(int32, optional, tag = "4")]
    pub batch_num: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    pub batch_size: Option<i32>,
    #[prost(message, repeated, tag = "6")]
    pub signature_infos: Vec<SignatureInfo>,
    #[prost(message, repeated, tag = "7")]
    pub keys: Vec<TemporaryExposureKey>,
    #[prost(message, repeated, tag = "8")]
    pub revised_keys: Vec<TemporaryExposureKey>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct SignatureInfo {
    #[prost(string, optional, tag = "3")]
    pub verification_key_version: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub verification_key_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub signature_algorithm: Option<String>,
}

impl SignatureInfo {
    /// Signature info for an ECDSA P-256 key
    pub fn ecdsa_p256(verification_key_id: &str, verification_key_version: &str) -> Self {
        Self {
            verification_key_version: Some(verification_key_version.to_string()),
            verification_key_id: Some(verification_key_id.to_string()),
            signature_algorithm: Some(SIGNATURE_ALGORITHM.to_string()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct TemporaryExposureKey {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_data: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "2")]
    pub transmission_risk_level: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub rolling_start_interval_number: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub rolling_period: Option<i32>,
    #[prost(enumeration = "ReportType", optional, tag = "5")]
    pub report_type: Option<i32>,
    #[prost(sint32, optional, tag = "6")]
    pub days_since_onset_of_symptoms: Option<i32>,
}

/// Wire enumeration for `TemporaryExposureKey.report_type`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ReportType {
    Unknown = 0,
    ConfirmedTest = 1,
    ConfirmedClinicalDiagnosis = 2,
    SelfReport = 3,
    Recursive = 4,
    Revoked = 5,
}

#[derive(Clone, PartialEq, Message)]
pub struct TekSignatureList {
    #[prost(message, repeated, tag = "1")]
    pub signatures: Vec<TekSignature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TekSignature {
    #[prost(message, optional, tag = "1")]
    pub signature_info: Option<SignatureInfo>,
    #[prost(int32, optional, tag = "2")]
    pub batch_num: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub batch_size: Option<i32>,
    /// ASN.1 DER encoded ECDSA signature
    #[prost(bytes = "vec", optional, tag = "4")]
    pub signature: Option<Vec<u8>>,
}

/// Header followed by the encoded export message
pub fn encode_export(export: &TemporaryExposureKeyExport) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(EXPORT_HEADER.len() + export.encoded_len());
    bytes.extend_from_slice(EXPORT_HEADER);
    bytes.extend_from_slice(&export.encode_to_vec());
    bytes
}

/// Checks the header and decodes the export message
///
/// # Errors
///
/// Returns [`TekError::Export`] for a missing header and
/// [`TekError::Serialization`] for a malformed body.
pub fn decode_export(bytes: &[u8]) -> Result<TemporaryExposureKeyExport> {
    let body = bytes
        .strip_prefix(EXPORT_HEADER.as_slice())
        .ok_or_else(|| TekError::Export("Export binary does not start with the v1 header".to_string()))?;
    Ok(TemporaryExposureKeyExport::decode(body)?)
}

pub fn encode_signature_list(list: &TekSignatureList) -> Vec<u8> {
    list.encode_to_vec()
}

pub fn decode_signature_list(bytes: &[u8]) -> Result<TekSignatureList> {
    Ok(TekSignatureList::decode(bytes)?)
}

/// Writes `bytes` to `<dir>/<file_name>` and returns the absolute path
pub(crate) fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)?;
    Ok(fs::canonicalize(&path)?)
}
