//! Integration tests for the canonical sorter and exposure data storage

use serde_json::{json, Value};
use tek_exporter::config::StorageConfig;
use tek_exporter::core::exposure_data::{content_file_name, ExposureDataStore};
use tek_exporter::core::sorter::{canonicalize_document, sort_exposure_windows};
use tek_exporter::domain::{PartitionKey, TekError};
use tempfile::TempDir;
use test_case::test_case;

fn scan(min: i64, typical: i64, seconds: i64) -> Value {
    json!({
        "MinAttenuationDb": min,
        "TypicalAttenuationDb": typical,
        "SecondsSinceLastScan": seconds
    })
}

fn document() -> Value {
    json!({
        "en_version": "1.7.0",
        "exposure_configuration": {"minimum_risk_score": 1},
        "exposure_informations": [
            {"DateMillisSinceEpoch": 300, "id": "c"},
            {"DateMillisSinceEpoch": 100, "id": "a"},
            {"DateMillisSinceEpoch": 200, "id": "b"}
        ],
        "daily_summaries": [
            {"DateMillisSinceEpoch": 20},
            {"DateMillisSinceEpoch": 10}
        ],
        "exposure_windows": [
            {"DateMillisSinceEpoch": 100, "ScanInstances": [scan(10, 20, 60)]},
            {"DateMillisSinceEpoch": 200, "ScanInstances": [scan(10, 20, 60)]},
            {"DateMillisSinceEpoch": 200, "ScanInstances": [scan(30, 40, 60), scan(50, 60, 60)]}
        ]
    })
}

fn dates(items: &Value) -> Vec<i64> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["DateMillisSinceEpoch"].as_i64().unwrap())
        .collect()
}

#[test]
fn test_document_is_sorted_in_place() {
    let mut doc = document();
    canonicalize_document(&mut doc).unwrap();

    assert_eq!(dates(&doc["exposure_informations"]), vec![100, 200, 300]);
    assert_eq!(dates(&doc["daily_summaries"]), vec![10, 20]);
    assert_eq!(dates(&doc["exposure_windows"]), vec![200, 200, 100]);

    // More scan instances first among windows of the same date
    let first = &doc["exposure_windows"][0]["ScanInstances"];
    assert_eq!(first.as_array().unwrap().len(), 2);
    assert_eq!(first[0]["MinAttenuationDb"], 50);
    assert_eq!(first[1]["MinAttenuationDb"], 30);
}

#[test]
fn test_sorting_is_idempotent() {
    let mut once = document();
    canonicalize_document(&mut once).unwrap();
    let mut twice = once.clone();
    canonicalize_document(&mut twice).unwrap();

    assert_eq!(once, twice);
}

#[test]
fn test_input_order_does_not_change_content_hash() {
    let mut shuffled = document();
    shuffled["exposure_informations"]
        .as_array_mut()
        .unwrap()
        .reverse();
    shuffled["exposure_windows"].as_array_mut().unwrap().reverse();

    let mut original = document();
    canonicalize_document(&mut original).unwrap();
    canonicalize_document(&mut shuffled).unwrap();

    assert_eq!(
        content_file_name(&original).unwrap(),
        content_file_name(&shuffled).unwrap()
    );
}

#[test]
fn test_equal_keys_keep_input_order() {
    let mut windows = vec![
        json!({"DateMillisSinceEpoch": 1, "ScanInstances": [scan(1, 1, 1)], "tag": "first"}),
        json!({"DateMillisSinceEpoch": 1, "ScanInstances": [scan(1, 1, 1)], "tag": "second"}),
    ];
    sort_exposure_windows(Some(&mut windows)).unwrap();

    assert_eq!(windows[0]["tag"], "first");
    assert_eq!(windows[1]["tag"], "second");
}

#[test_case("exposure_informations", json!(null) ; "null sequence is kept")]
#[test_case("exposure_windows", json!([]) ; "empty sequence is kept")]
fn test_absent_sequences_are_left_alone(field: &str, value: Value) {
    let mut doc = document();
    doc[field] = value.clone();
    canonicalize_document(&mut doc).unwrap();

    assert_eq!(doc[field], value);
}

#[test_case(json!({"exposure_windows": [{"ScanInstances": []}]}) ; "window without date")]
#[test_case(json!({"daily_summaries": "yesterday"}) ; "sequence is not an array")]
#[test_case(json!({"exposure_windows": [{"DateMillisSinceEpoch": 1, "ScanInstances": [{"MinAttenuationDb": 1}]}]}) ; "incomplete scan instance")]
fn test_malformed_documents_are_rejected(doc: Value) {
    let mut doc = doc;
    assert!(matches!(
        canonicalize_document(&mut doc),
        Err(TekError::Validation(_))
    ));
}

#[test]
fn test_store_is_content_addressed() {
    let temp = TempDir::new().unwrap();
    let store = ExposureDataStore::new(
        &StorageConfig {
            base_path: temp.path().to_string_lossy().to_string(),
            base_url: "https://cdn.example.org/tek".to_string(),
        },
        1024 * 1024,
    );
    let partition = PartitionKey::cluster("123456").unwrap();

    let mut reversed = document();
    reversed["daily_summaries"].as_array_mut().unwrap().reverse();

    let first = store
        .put(&partition, &serde_json::to_vec(&document()).unwrap())
        .unwrap();
    let second = store
        .put(&partition, &serde_json::to_vec(&reversed).unwrap())
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.file_name, second.file_name);
    assert!(first
        .url
        .starts_with("https://cdn.example.org/tek/exposure_data/123456/"));

    let stored: Value = serde_json::from_slice(&std::fs::read(&first.path).unwrap()).unwrap();
    assert_eq!(stored["file_name"], first.file_name.as_str());
    assert_eq!(dates(&stored["daily_summaries"]), vec![10, 20]);

    store.write_index(&partition).unwrap();
    assert_eq!(store.list(&partition).unwrap().len(), 1);
}
