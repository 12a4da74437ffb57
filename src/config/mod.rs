//! Configuration management
//!
//! TOML configuration with `${VAR_NAME}` substitution, `TEK_*` environment
//! overrides and validation on load.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tek_exporter::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tek-exporter.toml")?;
//! println!("Publishing under {}", config.storage.base_url);
//! println!("Partition scheme: {}", config.ingest.partition_scheme);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${TEK_DATABASE_URL}"
//! ssl_mode = "require"
//!
//! [storage]
//! base_path = "/srv/tek"
//! base_url = "https://cdn.example.org/tek"
//!
//! [signing]
//! private_key_path = "/etc/tek-exporter/signing-key.pem"
//! verification_key_id = "440"
//!
//! [ingest]
//! partition_scheme = "cluster"
//! dedup_scope = "key_material"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, Environment, ExportConfig, IngestConfig, LoggingConfig, PostgreSQLConfig,
    SigningConfig, StorageConfig, TekConfig,
};
pub use secret::{redact_connection_string, secret_string, SecretString, SecretValue};
