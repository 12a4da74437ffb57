//! Domain error types
//!
//! This module defines the error hierarchy for the exporter. Errors are
//! domain-specific and don't expose third-party types; adapters convert
//! driver, codec and crypto errors into one of these variants at the seam.

use thiserror::Error;

/// Main error type
///
/// This is the primary error type used throughout the crate. The variant
/// decides how a failure is surfaced: `Validation` is a client error that
/// rejects an upload, everything in the export pipeline aborts only the
/// partition being processed.
#[derive(Debug, Error)]
pub enum TekError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected client input (missing field, malformed partition, bad key)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage errors
    #[error("Database error: {0}")]
    Database(String),

    /// Export process errors
    #[error("Export error: {0}")]
    Export(String),

    /// Signing key loading or signature errors
    #[error("Signing error: {0}")]
    Signing(String),

    /// Bundle archive errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl TekError {
    /// Whether the error was caused by the submitted data rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, TekError::Validation(_))
    }
}

/// Export-specific error details
///
/// Provides additional context for a failed partition export.
#[derive(Debug, Clone)]
pub struct ExportErrorDetail {
    /// Partition associated with the error
    pub partition: Option<String>,

    /// Number of keys that were selected when the failure happened
    pub key_count: Option<usize>,

    /// Error message
    pub message: String,
}

impl ExportErrorDetail {
    /// Creates a new export error detail
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            partition: None,
            key_count: None,
            message: message.into(),
        }
    }

    /// Sets the partition
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Sets the number of selected keys
    pub fn with_key_count(mut self, key_count: usize) -> Self {
        self.key_count = Some(key_count);
        self
    }
}

impl From<std::io::Error> for TekError {
    fn from(err: std::io::Error) -> Self {
        TekError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TekError {
    fn from(err: serde_json::Error) -> Self {
        TekError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TekError {
    fn from(err: toml::de::Error) -> Self {
        TekError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<prost::DecodeError> for TekError {
    fn from(err: prost::DecodeError) -> Self {
        TekError::Serialization(format!("Protobuf decode error: {err}"))
    }
}

impl From<zip::result::ZipError> for TekError {
    fn from(err: zip::result::ZipError) -> Self {
        TekError::Archive(err.to_string())
    }
}

impl From<tokio_postgres::Error> for TekError {
    fn from(err: tokio_postgres::Error) -> Self {
        TekError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TekError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");

        let err = TekError::Validation("missing field `key`".to_string());
        assert_eq!(err.to_string(), "Validation error: missing field `key`");
    }

    #[test]
    fn test_is_client_error() {
        assert!(TekError::Validation("x".to_string()).is_client_error());
        assert!(!TekError::Database("x".to_string()).is_client_error());
        assert!(!TekError::Export("x".to_string()).is_client_error());
    }

    #[test]
    fn test_export_error_detail_builder() {
        let detail = ExportErrorDetail::new("Signing failed")
            .with_partition("123456")
            .with_key_count(14);

        assert_eq!(detail.partition, Some("123456".to_string()));
        assert_eq!(detail.key_count, Some(14));
        assert_eq!(detail.message, "Signing failed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: TekError = io_err.into();
        assert!(matches!(err, TekError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: TekError = json_err.into();
        assert!(matches!(err, TekError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: TekError = toml_err.into();
        assert!(matches!(err, TekError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_implements_std_error() {
        let err = TekError::Signing("bad key".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
