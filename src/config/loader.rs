//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::TekConfig;
use super::secret::secret_string;
use crate::domain::errors::TekError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Prefix of the environment variables that override file settings
pub const ENV_PREFIX: &str = "TEK_";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into TekConfig
/// 4. Applies environment variable overrides (TEK_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`TekError::Configuration`] if the file cannot be read or parsed,
/// a referenced variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use tek_exporter::config::loader::load_config;
///
/// let config = load_config("tek-exporter.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TekConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TekError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        TekError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
///
/// Same pipeline as [`load_config`] without the file access.
pub fn parse_config(contents: &str) -> Result<TekConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: TekConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    config
        .validate()
        .map_err(|e| TekError::Configuration(format!("Configuration validation failed: {e}")))?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| TekError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(TekError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env(section_key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{section_key}")).ok()
}

/// Applies environment variable overrides using the TEK_* prefix
///
/// Variables follow the pattern `TEK_<SECTION>_<KEY>`, for example
/// `TEK_STORAGE_BASE_PATH` or `TEK_INGEST_DEDUP_SCOPE`. Values that fail to
/// parse leave the file setting in place.
fn apply_env_overrides(config: &mut TekConfig) {
    // Application
    if let Some(val) = env("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env("APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // PostgreSQL
    if let Some(val) = env("POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Some(size) = env("POSTGRESQL_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        config.postgresql.max_connections = size;
    }
    if let Some(val) = env("POSTGRESQL_SSL_MODE") {
        config.postgresql.ssl_mode = val;
    }

    // Storage
    if let Some(val) = env("STORAGE_BASE_PATH") {
        config.storage.base_path = val;
    }
    if let Some(val) = env("STORAGE_BASE_URL") {
        config.storage.base_url = val;
    }

    // Signing
    if let Some(val) = env("SIGNING_PRIVATE_KEY_PATH") {
        config.signing.private_key_path = val;
    }
    if let Some(val) = env("SIGNING_VERIFICATION_KEY_ID") {
        config.signing.verification_key_id = val;
    }
    if let Some(val) = env("SIGNING_VERIFICATION_KEY_VERSION") {
        config.signing.verification_key_version = val;
    }

    // Ingest
    if let Some(scheme) = env("INGEST_PARTITION_SCHEME").and_then(|v| v.parse().ok()) {
        config.ingest.partition_scheme = scheme;
    }
    if let Some(scope) = env("INGEST_DEDUP_SCOPE").and_then(|v| v.parse().ok()) {
        config.ingest.dedup_scope = scope;
    }
    if let Some(risk) = env("INGEST_DEFAULT_TRANSMISSION_RISK").and_then(|v| v.parse().ok()) {
        config.ingest.default_transmission_risk = risk;
    }
    if let Some(bytes) = env("INGEST_MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()) {
        config.ingest.max_upload_bytes = bytes;
    }

    // Export
    if let Some(val) = env("EXPORT_DRY_RUN") {
        config.export.dry_run = val.parse().unwrap_or(false);
    }
    if let Some(val) = env("EXPORT_WRITE_INDEX") {
        config.export.write_index = val.parse().unwrap_or(true);
    }

    // Logging
    if let Some(val) = env("LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Some(val) = env("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
