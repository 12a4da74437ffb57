//! Key store factory
//!
//! This module provides the factory function that builds the configured key store.

use crate::adapters::database::traits::KeyStore;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::TekConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the key store described by the configuration
///
/// # Errors
///
/// Returns an error if the connection pool cannot be created
pub async fn create_key_store(config: &TekConfig) -> Result<Arc<dyn KeyStore + Send + Sync>> {
    tracing::info!("Creating PostgreSQL key store");
    let client = PostgreSQLClient::new(config.postgresql.clone()).await?;
    let adapter = PostgreSQLAdapter::new(client);

    Ok(Arc::new(adapter) as Arc<dyn KeyStore + Send + Sync>)
}
