//! CLI command implementations
//!
//! Every command returns its process exit code:
//! 0 ok, 1 partial failure, 2 configuration, 3 validation, 4 connection,
//! 5 fatal, 130 interrupted.

pub mod export;
pub mod exposure_data;
pub mod ingest;
pub mod init;
pub mod status;
pub mod validate;

use crate::adapters::database::{create_key_store, KeyStore};
use crate::config::TekConfig;
use crate::domain::ids::{PartitionKey, PartitionScheme};
use std::sync::Arc;

/// Splits a comma-separated `--partition` value under the configured scheme
pub(crate) fn parse_partition_list(
    value: &str,
    scheme: PartitionScheme,
) -> Result<Vec<PartitionKey>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| PartitionKey::parse(s, scheme))
        .collect()
}

/// Connects to the key store and makes sure the schema exists
///
/// On failure the error is printed and the connection exit code returned.
pub(crate) async fn connect_store(
    config: &TekConfig,
) -> Result<Arc<dyn KeyStore + Send + Sync>, i32> {
    let store = match create_key_store(config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create key store");
            eprintln!("❌ Failed to connect to database: {e}");
            return Err(4);
        }
    };

    if let Err(e) = store.test_connection().await {
        tracing::error!(error = %e, "Key store connection test failed");
        eprintln!("❌ Database connection test failed: {e}");
        return Err(4);
    }

    if let Err(e) = store.ensure_schema().await {
        tracing::error!(error = %e, "Failed to apply schema");
        eprintln!("❌ Failed to apply database schema: {e}");
        return Err(4);
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partition_list() {
        let partitions = parse_partition_list("111111, 222222,", PartitionScheme::Cluster).unwrap();
        assert_eq!(
            partitions,
            vec![
                PartitionKey::cluster("111111").unwrap(),
                PartitionKey::cluster("222222").unwrap()
            ]
        );

        let regions = parse_partition_list("JP/13,US", PartitionScheme::Region).unwrap();
        assert_eq!(regions[0].sub_region(), Some("13"));
        assert_eq!(regions[1].sub_region(), None);
    }

    #[test]
    fn test_parse_partition_list_rejects_bad_entry() {
        assert!(parse_partition_list("111111,abc", PartitionScheme::Cluster).is_err());
    }
}
