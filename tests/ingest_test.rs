//! Integration tests for key ingestion
//!
//! Uploads go through the ingest coordinator into the in-memory key store,
//! covering both payload shapes, both dedup scopes and upload rejection.

use std::sync::Arc;
use tek_exporter::adapters::database::KeyStore;
use tek_exporter::adapters::memory::MemoryKeyStore;
use tek_exporter::config::IngestConfig;
use tek_exporter::core::ingest::canonicalize::days_since_onset;
use tek_exporter::core::ingest::IngestCoordinator;
use tek_exporter::domain::diagnosis_key::DAYS_SINCE_ONSET_UNKNOWN;
use tek_exporter::domain::submission::parse_onset_date;
use tek_exporter::domain::{DedupScope, PartitionKey, PartitionScheme, TekError};
use test_case::test_case;

const KEY_A: &str = "AAECAwQFBgcICQoLDA0ODw==";
const KEY_B: &str = "EBESExQVFhcYGRobHB0eHw==";

fn ingest_config(scheme: PartitionScheme, scope: DedupScope) -> IngestConfig {
    IngestConfig {
        partition_scheme: scheme,
        dedup_scope: scope,
        ..IngestConfig::default()
    }
}

fn single_upload(token: &str, keys: &[&str]) -> String {
    let keys: Vec<String> = keys
        .iter()
        .map(|k| {
            format!(
                r#"{{"key":"{k}","reportType":1,"rollingStartNumber":2650176,"rollingPeriod":144}}"#
            )
        })
        .collect();
    format!(
        r#"{{"idempotencyKey":"{token}","temporaryExposureKeys":[{}]}}"#,
        keys.join(",")
    )
}

#[tokio::test]
async fn test_repeat_upload_stores_nothing_twice() {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(
        store.clone(),
        ingest_config(PartitionScheme::Cluster, DedupScope::KeyMaterial),
        false,
    );
    let partition = ingest.parse_partition("123456").unwrap();
    let body = single_upload("token-1", &[KEY_A, KEY_B]);

    let first = ingest
        .ingest_bytes(body.as_bytes(), Some(partition.clone()))
        .await
        .unwrap();
    assert_eq!(first.inserted_count(), 2);
    assert_eq!(first.duplicates_skipped, 0);

    let second = ingest
        .ingest_bytes(body.as_bytes(), Some(partition.clone()))
        .await
        .unwrap();
    assert_eq!(second.inserted_count(), 0);
    assert_eq!(second.duplicates_skipped, 2);

    assert_eq!(store.records().unwrap().len(), 2);
    assert_eq!(store.pending_partitions().await.unwrap(), vec![partition]);
}

#[test_case(DedupScope::KeyMaterial, 0 ; "key material ignores the token")]
#[test_case(DedupScope::DedupKey, 1 ; "dedup key includes the token")]
#[tokio::test]
async fn test_new_token_same_key(scope: DedupScope, expected_inserted: usize) {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(
        store.clone(),
        ingest_config(PartitionScheme::Cluster, scope),
        false,
    );
    let partition = ingest.parse_partition("123456").unwrap();

    ingest
        .ingest_bytes(
            single_upload("token-1", &[KEY_A]).as_bytes(),
            Some(partition.clone()),
        )
        .await
        .unwrap();
    let summary = ingest
        .ingest_bytes(
            single_upload("token-2", &[KEY_A]).as_bytes(),
            Some(partition),
        )
        .await
        .unwrap();

    assert_eq!(summary.inserted_count(), expected_inserted);
}

#[tokio::test]
async fn test_multi_partition_upload_fans_out() {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(
        store.clone(),
        ingest_config(PartitionScheme::Region, DedupScope::KeyMaterial),
        false,
    );

    let body = format!(
        r#"{{
            "keys": [{{"key":"{KEY_A}","reportType":1,"rollingStartNumber":2650176,"rollingPeriod":144}}],
            "regions": ["JP"],
            "sub_regions": ["13", "27"],
            "symptomOnsetDate": "2020-05-20T00:00:00.000Z"
        }}"#
    );
    let summary = ingest.ingest_bytes(body.as_bytes(), None).await.unwrap();

    assert_eq!(summary.partitions, vec!["JP/13", "JP/27", "JP"]);
    assert_eq!(summary.inserted_count(), 3);
    assert!(summary
        .inserted
        .iter()
        .all(|k| k.days_since_onset_of_symptoms == 2 && k.transmission_risk == 4));

    let mut pending = store.pending_partitions().await.unwrap();
    pending.sort();
    assert_eq!(pending.len(), 3);
    assert!(pending.contains(&PartitionKey::new("JP", None).unwrap()));
}

#[tokio::test]
async fn test_days_since_onset_derived_from_onset_date() {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(store, IngestConfig::default(), false);
    let body = format!(
        r#"{{
            "symptomOnsetDate": "2020-05-01T00:00:00.000000+00:00",
            "temporaryExposureKeys": [{{"key":"{KEY_A}","reportType":1,"rollingStartNumber":2650000,"rollingPeriod":144}}]
        }}"#
    );

    let summary = ingest
        .ingest_bytes(body.as_bytes(), Some(PartitionKey::cluster("123456").unwrap()))
        .await
        .unwrap();

    assert_eq!(summary.inserted[0].days_since_onset_of_symptoms, 19);

    let onset = parse_onset_date("2020-05-01T00:00:00.000000+00:00").unwrap();
    assert_eq!(days_since_onset(2_650_000, onset).unwrap(), 19);
}

#[tokio::test]
async fn test_idempotency_key_generated_when_absent() {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(store, IngestConfig::default(), false);
    let body = format!(
        r#"{{"temporaryExposureKeys":[{{"key":"{KEY_A}","reportType":1,"rollingStartNumber":2650176,"rollingPeriod":144}}]}}"#
    );

    let summary = ingest
        .ingest_bytes(body.as_bytes(), Some(PartitionKey::cluster("123456").unwrap()))
        .await
        .unwrap();

    assert_eq!(summary.idempotency_key.len(), 32);
    assert_eq!(
        summary.inserted[0].days_since_onset_of_symptoms,
        DAYS_SINCE_ONSET_UNKNOWN
    );
}

#[test_case(r#"{"key":"AAAA","reportType":1,"rollingStartNumber":2650176,"rollingPeriod":144}"# ; "short key")]
#[test_case(r#"{"key":"AAECAwQFBgcICQoLDA0ODw==","reportType":1,"rollingStartNumber":2650176,"rollingPeriod":0}"# ; "zero rolling period")]
#[test_case(r#"{"key":"AAECAwQFBgcICQoLDA0ODw==","reportType":1,"rollingStartNumber":-1,"rollingPeriod":144}"# ; "negative rolling start")]
#[test_case(r#"{"key":"AAECAwQFBgcICQoLDA0ODw==","reportType":9,"rollingStartNumber":2650176,"rollingPeriod":144}"# ; "unknown report type")]
#[test_case(r#"{"reportType":1,"rollingStartNumber":2650176,"rollingPeriod":144}"# ; "missing key field")]
#[tokio::test]
async fn test_one_bad_key_rejects_whole_upload(bad_key: &str) {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(store.clone(), IngestConfig::default(), false);
    let body = format!(
        r#"{{"temporaryExposureKeys":[{{"key":"{KEY_B}","reportType":1,"rollingStartNumber":2650176,"rollingPeriod":144}},{bad_key}]}}"#
    );

    let err = ingest
        .ingest_bytes(body.as_bytes(), Some(PartitionKey::cluster("123456").unwrap()))
        .await
        .unwrap_err();

    assert!(matches!(err, TekError::Validation(_)));
    assert!(store.records().unwrap().is_empty());
}

#[tokio::test]
async fn test_cluster_scheme_rejects_region_names() {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(store, IngestConfig::default(), false);

    assert!(ingest.parse_partition("JP/13").is_err());
    assert!(ingest.parse_partition("12345").is_err());
    assert!(ingest.parse_partition("123456").is_ok());
}

#[tokio::test]
async fn test_dry_run_reports_without_storing() {
    let store = Arc::new(MemoryKeyStore::new());
    let ingest = IngestCoordinator::new(store.clone(), IngestConfig::default(), true);

    let summary = ingest
        .ingest_bytes(
            single_upload("token-1", &[KEY_A, KEY_B]).as_bytes(),
            Some(PartitionKey::cluster("123456").unwrap()),
        )
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.inserted_count(), 2);
    assert!(store.records().unwrap().is_empty());
}
