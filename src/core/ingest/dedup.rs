//! Deduplication gate
//!
//! Decides whether a canonical record already has a stored equivalent. The
//! storage adapters evaluate [`is_equivalent`] (or its SQL counterpart)
//! inside the ingest transaction; [`collapse_duplicates`] removes repeats
//! within a single upload before anything reaches storage.

use crate::domain::diagnosis_key::DiagnosisKeyRecord;
use crate::domain::ids::DedupScope;
use std::collections::HashSet;

/// Whether `stored` makes `candidate` a duplicate under `scope`
pub fn is_equivalent(
    scope: DedupScope,
    stored: &DiagnosisKeyRecord,
    candidate: &DiagnosisKeyRecord,
) -> bool {
    match scope {
        DedupScope::KeyMaterial => {
            stored.partition == candidate.partition && stored.key_data == candidate.key_data
        }
        DedupScope::DedupKey => stored.dedup_key == candidate.dedup_key,
    }
}

/// Keeps the first occurrence of every record under `scope`
///
/// Returns the surviving records in input order and the number dropped.
pub fn collapse_duplicates(
    records: Vec<DiagnosisKeyRecord>,
    scope: DedupScope,
) -> (Vec<DiagnosisKeyRecord>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let total = records.len();

    let unique: Vec<DiagnosisKeyRecord> = records
        .into_iter()
        .filter(|record| seen.insert(identity(scope, record)))
        .collect();

    let dropped = total - unique.len();
    (unique, dropped)
}

fn identity(scope: DedupScope, record: &DiagnosisKeyRecord) -> String {
    match scope {
        DedupScope::KeyMaterial => format!(
            "{}|{}",
            record.partition,
            record
                .key_data
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        ),
        DedupScope::DedupKey => record.dedup_key.as_str().to_string(),
    }
}
