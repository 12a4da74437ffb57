//! Logging and observability
//!
//! Structured logging with configurable levels, a console layer and an
//! optional rotating JSON file, plus a few macros that keep the field names
//! of recurring events consistent.
//!
//! # Example
//!
//! ```no_run
//! use tek_exporter::logging::init_logging;
//! use tek_exporter::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a partition export
///
/// # Example
///
/// ```no_run
/// use tek_exporter::log_partition_export_start;
/// use tek_exporter::domain::PartitionKey;
///
/// let partition = PartitionKey::cluster("123456").unwrap();
/// log_partition_export_start!(&partition, 42);
/// ```
#[macro_export]
macro_rules! log_partition_export_start {
    ($partition:expr, $key_count:expr) => {
        tracing::info!(
            partition = %$partition,
            key_count = $key_count,
            "Starting partition export"
        );
    };
}

/// Log the completion of a partition export
///
/// # Example
///
/// ```no_run
/// use tek_exporter::log_partition_export_complete;
/// use tek_exporter::domain::PartitionKey;
/// use std::time::Duration;
///
/// let partition = PartitionKey::cluster("123456").unwrap();
/// log_partition_export_complete!(&partition, 42, "/srv/tek/123456/diagnosis_keys/a.zip", Duration::from_millis(15));
/// ```
#[macro_export]
macro_rules! log_partition_export_complete {
    ($partition:expr, $key_count:expr, $archive:expr, $duration:expr) => {
        tracing::info!(
            partition = %$partition,
            key_count = $key_count,
            archive = %$archive,
            duration_ms = $duration.as_millis(),
            "Partition export completed"
        );
    };
}

/// Log the outcome of one key upload
///
/// # Example
///
/// ```no_run
/// use tek_exporter::log_ingest_result;
///
/// log_ingest_result!("3f2a", 2, 14, 3);
/// ```
#[macro_export]
macro_rules! log_ingest_result {
    ($idempotency_key:expr, $partitions:expr, $inserted:expr, $duplicates:expr) => {
        tracing::info!(
            idempotency_key = %$idempotency_key,
            partitions = $partitions,
            inserted = $inserted,
            duplicates_skipped = $duplicates,
            "Upload ingested"
        );
    };
}
