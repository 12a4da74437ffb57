//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that scope deduplication and export:
//! the partition a key belongs to, the idempotency token of a submission and
//! the composite dedup key derived from both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Separator between region and sub-region in the textual partition form
pub const PARTITION_SEPARATOR: char = '/';

/// Delimiter used when composing a [`DedupKey`]
pub const DEDUP_KEY_DELIMITER: &str = ",";

/// Length of a cluster identifier
const CLUSTER_ID_LEN: usize = 6;

/// How partition identifiers are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartitionScheme {
    /// A single six-digit cluster identifier
    #[default]
    Cluster,
    /// A region with an optional sub-region
    Region,
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionScheme::Cluster => write!(f, "cluster"),
            PartitionScheme::Region => write!(f, "region"),
        }
    }
}

impl FromStr for PartitionScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cluster" => Ok(PartitionScheme::Cluster),
            "region" => Ok(PartitionScheme::Region),
            _ => Err(format!(
                "Invalid partition scheme '{s}'. Must be one of: cluster, region"
            )),
        }
    }
}

/// What the deduplication gate compares against already stored keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Same partition and same key bytes
    #[default]
    KeyMaterial,
    /// Exact dedup key (token, partition, key and validity window)
    DedupKey,
}

impl fmt::Display for DedupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupScope::KeyMaterial => write!(f, "key_material"),
            DedupScope::DedupKey => write!(f, "dedup_key"),
        }
    }
}

impl FromStr for DedupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "key_material" => Ok(DedupScope::KeyMaterial),
            "dedup_key" => Ok(DedupScope::DedupKey),
            _ => Err(format!(
                "Invalid dedup scope '{s}'. Must be one of: key_material, dedup_key"
            )),
        }
    }
}

/// Isolation boundary for dedup, storage and export
///
/// A cluster id is modelled as a region without a sub-region, so both
/// observed partitioning schemes share one code path. Region-level entries
/// are stored with an empty sub-region.
///
/// # Examples
///
/// ```
/// use tek_exporter::domain::ids::{PartitionKey, PartitionScheme};
///
/// let cluster = PartitionKey::parse("123456", PartitionScheme::Cluster).unwrap();
/// assert_eq!(cluster.to_string(), "123456");
///
/// let sub = PartitionKey::parse("JP/13", PartitionScheme::Region).unwrap();
/// assert_eq!(sub.region(), "JP");
/// assert_eq!(sub.sub_region(), Some("13"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PartitionKeyParts")]
pub struct PartitionKey {
    region: String,
    sub_region: Option<String>,
}

/// Unvalidated wire form of [`PartitionKey`]
#[derive(Deserialize)]
struct PartitionKeyParts {
    region: String,
    #[serde(default)]
    sub_region: Option<String>,
}

impl TryFrom<PartitionKeyParts> for PartitionKey {
    type Error = String;

    fn try_from(parts: PartitionKeyParts) -> Result<Self, Self::Error> {
        Self::new(parts.region, parts.sub_region)
    }
}

impl PartitionKey {
    /// Creates a partition from a region and optional sub-region
    ///
    /// An empty sub-region is treated as region level.
    pub fn new(region: impl Into<String>, sub_region: Option<String>) -> Result<Self, String> {
        let region = region.into();
        validate_component(&region, "region")?;

        let sub_region = match sub_region {
            Some(s) if s.is_empty() => None,
            Some(s) => {
                validate_component(&s, "sub-region")?;
                Some(s)
            }
            None => None,
        };

        Ok(Self { region, sub_region })
    }

    /// Creates a partition from a six-digit cluster identifier
    pub fn cluster(cluster_id: impl Into<String>) -> Result<Self, String> {
        let cluster_id = cluster_id.into();
        if cluster_id.len() != CLUSTER_ID_LEN || !cluster_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!(
                "Invalid cluster id '{cluster_id}': expected {CLUSTER_ID_LEN} ASCII digits"
            ));
        }
        Ok(Self {
            region: cluster_id,
            sub_region: None,
        })
    }

    /// Parses the textual form (`region` or `region/sub_region`) under a scheme
    pub fn parse(s: &str, scheme: PartitionScheme) -> Result<Self, String> {
        match scheme {
            PartitionScheme::Cluster => Self::cluster(s),
            PartitionScheme::Region => match s.split_once(PARTITION_SEPARATOR) {
                Some((region, sub_region)) => Self::new(region, Some(sub_region.to_string())),
                None => Self::new(s, None),
            },
        }
    }

    /// Rebuilds a partition from its stored columns
    pub fn from_storage(region: String, sub_region: String) -> Result<Self, String> {
        Self::new(region, Some(sub_region))
    }

    /// Returns the region (or cluster id)
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the sub-region, `None` for region-level partitions
    pub fn sub_region(&self) -> Option<&str> {
        self.sub_region.as_deref()
    }

    /// Sub-region as stored: empty string for region-level partitions
    pub fn storage_sub_region(&self) -> &str {
        self.sub_region.as_deref().unwrap_or("")
    }

    /// Relative directory used for this partition's published files
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.region);
        if let Some(sub_region) = &self.sub_region {
            path.push(sub_region);
        }
        path
    }
}

fn validate_component(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("Partition {what} cannot be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!(
            "Invalid partition {what} '{value}': only ASCII letters, digits, '-' and '_' are allowed"
        ));
    }
    Ok(())
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_region {
            Some(sub_region) => write!(f, "{}{}{}", self.region, PARTITION_SEPARATOR, sub_region),
            None => write!(f, "{}", self.region),
        }
    }
}

/// Idempotency token of one submission
///
/// Supplied by the client or generated by the server when absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a token from a client-supplied string
    pub fn new(token: impl Into<String>) -> Result<Self, String> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err("Idempotency key cannot be empty".to_string());
        }
        Ok(Self(token))
    }

    /// Generates a fresh server-side token (UUIDv4, hex without dashes)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic natural key of a stored diagnosis key
///
/// Composed from the idempotency token, the partition, the base64 key
/// material and the validity window. Any change in any component yields a
/// different key; matching is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Composes the dedup key from its parts
    ///
    /// # Examples
    ///
    /// ```
    /// use tek_exporter::domain::ids::{DedupKey, IdempotencyKey, PartitionKey};
    ///
    /// let token = IdempotencyKey::new("token").unwrap();
    /// let partition = PartitionKey::cluster("123456").unwrap();
    /// let key = DedupKey::compose(&token, &partition, "AAAAAAAAAAAAAAAAAAAAAA==", 2650000, 144);
    /// assert_eq!(key.as_str(), "token,123456,,AAAAAAAAAAAAAAAAAAAAAA==,2650000,144");
    /// ```
    pub fn compose(
        token: &IdempotencyKey,
        partition: &PartitionKey,
        key_base64: &str,
        rolling_start_number: i32,
        rolling_period: i32,
    ) -> Self {
        Self(
            [
                token.as_str(),
                partition.region(),
                partition.storage_sub_region(),
                key_base64,
                &rolling_start_number.to_string(),
                &rolling_period.to_string(),
            ]
            .join(DEDUP_KEY_DELIMITER),
        )
    }

    /// Wraps a dedup key read back from storage
    pub fn from_storage(value: String) -> Self {
        Self(value)
    }

    /// Returns the dedup key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DedupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_partition_valid() {
        let partition = PartitionKey::cluster("012345").unwrap();
        assert_eq!(partition.region(), "012345");
        assert_eq!(partition.sub_region(), None);
        assert_eq!(partition.storage_sub_region(), "");
    }

    #[test]
    fn test_partition_deserialize_validates() {
        let partition: PartitionKey =
            serde_json::from_str(r#"{"region":"JP","sub_region":"13"}"#).unwrap();
        assert_eq!(partition, PartitionKey::new("JP", Some("13".to_string())).unwrap());

        let region_level: PartitionKey = serde_json::from_str(r#"{"region":"JP"}"#).unwrap();
        assert_eq!(region_level.sub_region(), None);

        assert!(serde_json::from_str::<PartitionKey>(r#"{"region":""}"#).is_err());
        assert!(
            serde_json::from_str::<PartitionKey>(r#"{"region":"JP","sub_region":"../x"}"#).is_err()
        );
    }

    #[test]
    fn test_cluster_partition_invalid() {
        assert!(PartitionKey::cluster("12345").is_err());
        assert!(PartitionKey::cluster("1234567").is_err());
        assert!(PartitionKey::cluster("12a456").is_err());
        assert!(PartitionKey::cluster("").is_err());
    }

    #[test]
    fn test_region_partition_parse() {
        let region = PartitionKey::parse("JP", PartitionScheme::Region).unwrap();
        assert_eq!(region.sub_region(), None);
        assert_eq!(region.to_string(), "JP");

        let sub = PartitionKey::parse("JP/tokyo", PartitionScheme::Region).unwrap();
        assert_eq!(sub.to_string(), "JP/tokyo");
        assert_eq!(sub.relative_path(), PathBuf::from("JP").join("tokyo"));
    }

    #[test]
    fn test_region_partition_rejects_traversal() {
        assert!(PartitionKey::parse("../etc", PartitionScheme::Region).is_err());
        assert!(PartitionKey::parse("JP/a/b", PartitionScheme::Region).is_err());
        assert!(PartitionKey::parse("/JP", PartitionScheme::Region).is_err());
    }

    #[test]
    fn test_empty_sub_region_is_region_level() {
        let from_storage = PartitionKey::from_storage("JP".to_string(), String::new()).unwrap();
        let region = PartitionKey::new("JP", None).unwrap();
        assert_eq!(from_storage, region);
    }

    #[test]
    fn test_partition_scheme_from_str() {
        assert_eq!(
            PartitionScheme::from_str("cluster").unwrap(),
            PartitionScheme::Cluster
        );
        assert_eq!(
            PartitionScheme::from_str("REGION").unwrap(),
            PartitionScheme::Region
        );
        assert!(PartitionScheme::from_str("zone").is_err());
    }

    #[test]
    fn test_idempotency_key_generate_is_unique() {
        let a = IdempotencyKey::generate();
        let b = IdempotencyKey::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(IdempotencyKey::new("  ").is_err());
    }

    #[test]
    fn test_dedup_key_changes_with_every_component() {
        let token = IdempotencyKey::new("t").unwrap();
        let partition = PartitionKey::cluster("123456").unwrap();
        let base = DedupKey::compose(&token, &partition, "k", 10, 144);

        let other_token = IdempotencyKey::new("u").unwrap();
        let other_partition = PartitionKey::cluster("654321").unwrap();

        assert_eq!(base, DedupKey::compose(&token, &partition, "k", 10, 144));
        assert_ne!(base, DedupKey::compose(&other_token, &partition, "k", 10, 144));
        assert_ne!(base, DedupKey::compose(&token, &other_partition, "k", 10, 144));
        assert_ne!(base, DedupKey::compose(&token, &partition, "j", 10, 144));
        assert_ne!(base, DedupKey::compose(&token, &partition, "k", 11, 144));
        assert_ne!(base, DedupKey::compose(&token, &partition, "k", 10, 143));
    }
}
