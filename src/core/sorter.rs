//! Canonical sorter for exposure metric documents
//!
//! Gives the nested sequences of an exposure metric document one total,
//! deterministic order so equal content always serializes (and hashes) the
//! same way. Every sort is stable, and a `null` sequence is left as is.
//!
//! Scan instances use the attenuation chain: descending by
//! `MinAttenuationDb`, then `TypicalAttenuationDb`, then `SecondsSinceLastScan`.

use crate::domain::{Result, TekError};
use serde_json::Value;
use std::cmp::Ordering;

pub const DATE_FIELD: &str = "DateMillisSinceEpoch";
pub const SCAN_INSTANCES_FIELD: &str = "ScanInstances";
pub const MIN_ATTENUATION_FIELD: &str = "MinAttenuationDb";
pub const TYPICAL_ATTENUATION_FIELD: &str = "TypicalAttenuationDb";
pub const SECONDS_SINCE_LAST_SCAN_FIELD: &str = "SecondsSinceLastScan";

pub const EXPOSURE_INFORMATIONS_FIELD: &str = "exposure_informations";
pub const DAILY_SUMMARIES_FIELD: &str = "daily_summaries";
pub const EXPOSURE_WINDOWS_FIELD: &str = "exposure_windows";

fn numeric_field(item: &Value, field: &str) -> Result<f64> {
    item.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| TekError::Validation(format!("`{field}` must be present and numeric")))
}

/// Sorts `items` by precomputed keys, keeping ties in input order
fn sort_by_keys<K>(items: &mut Vec<Value>, keys: Vec<K>, compare: impl Fn(&K, &K) -> Ordering) {
    let mut decorated: Vec<(K, Value)> = keys.into_iter().zip(std::mem::take(items)).collect();
    decorated.sort_by(|a, b| compare(&a.0, &b.0));
    items.extend(decorated.into_iter().map(|(_, item)| item));
}

fn sort_ascending_by_date(items: &mut Vec<Value>) -> Result<()> {
    let keys = items
        .iter()
        .map(|item| numeric_field(item, DATE_FIELD))
        .collect::<Result<Vec<_>>>()?;
    sort_by_keys(items, keys, |a, b| a.total_cmp(b));
    Ok(())
}

/// Ascending by `DateMillisSinceEpoch`
pub fn sort_exposure_informations(items: Option<&mut Vec<Value>>) -> Result<()> {
    match items {
        Some(items) => sort_ascending_by_date(items),
        None => Ok(()),
    }
}

/// Ascending by `DateMillisSinceEpoch`
pub fn sort_daily_summaries(items: Option<&mut Vec<Value>>) -> Result<()> {
    match items {
        Some(items) => sort_ascending_by_date(items),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy)]
struct Attenuation {
    min: f64,
    typical: f64,
    seconds: f64,
}

impl Attenuation {
    fn of(scan: &Value) -> Result<Self> {
        Ok(Self {
            min: numeric_field(scan, MIN_ATTENUATION_FIELD)?,
            typical: numeric_field(scan, TYPICAL_ATTENUATION_FIELD)?,
            seconds: numeric_field(scan, SECONDS_SINCE_LAST_SCAN_FIELD)?,
        })
    }

    fn descending(&self, other: &Self) -> Ordering {
        other
            .min
            .total_cmp(&self.min)
            .then_with(|| other.typical.total_cmp(&self.typical))
            .then_with(|| other.seconds.total_cmp(&self.seconds))
    }
}

/// Descending attenuation chain
pub fn sort_scan_instances(items: Option<&mut Vec<Value>>) -> Result<()> {
    let Some(items) = items else {
        return Ok(());
    };
    let keys = items
        .iter()
        .map(Attenuation::of)
        .collect::<Result<Vec<_>>>()?;
    sort_by_keys(items, keys, Attenuation::descending);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct WindowKey {
    date: f64,
    count: usize,
    totals: Attenuation,
}

impl WindowKey {
    fn descending(&self, other: &Self) -> Ordering {
        other
            .date
            .total_cmp(&self.date)
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| self.totals.descending(&other.totals))
    }
}

fn scan_instances_mut(window: &mut Value) -> Result<Option<&mut Vec<Value>>> {
    match window.get_mut(SCAN_INSTANCES_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(scans)) => Ok(Some(scans)),
        Some(_) => Err(TekError::Validation(format!(
            "`{SCAN_INSTANCES_FIELD}` must be an array"
        ))),
    }
}

fn window_key(window: &mut Value) -> Result<WindowKey> {
    let date = numeric_field(window, DATE_FIELD)?;
    let mut totals = Attenuation {
        min: 0.0,
        typical: 0.0,
        seconds: 0.0,
    };
    let mut count = 0;

    if let Some(scans) = scan_instances_mut(window)? {
        sort_scan_instances(Some(&mut *scans))?;
        for scan in scans.iter() {
            let attenuation = Attenuation::of(scan)?;
            totals.min += attenuation.min;
            totals.typical += attenuation.typical;
            totals.seconds += attenuation.seconds;
        }
        count = scans.len();
    }

    Ok(WindowKey {
        date,
        count,
        totals,
    })
}

/// Sorts each window's scan instances, then the windows themselves
///
/// Windows are descending by date, then scan instance count, then the sums
/// of minimum attenuation, typical attenuation and seconds since last scan.
pub fn sort_exposure_windows(items: Option<&mut Vec<Value>>) -> Result<()> {
    let Some(items) = items else {
        return Ok(());
    };
    let keys = items
        .iter_mut()
        .map(window_key)
        .collect::<Result<Vec<_>>>()?;
    sort_by_keys(items, keys, WindowKey::descending);
    Ok(())
}

/// Borrows a top-level sequence of a document, `None` when absent or null
fn sequence_mut<'a>(document: &'a mut Value, field: &str) -> Result<Option<&'a mut Vec<Value>>> {
    match document.get_mut(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(TekError::Validation(format!("`{field}` must be an array"))),
    }
}

/// Applies every canonical sort to a document in place
///
/// # Errors
///
/// Returns [`TekError::Validation`] when a sequence is not an array or an
/// element lacks a numeric sort field. The document may be partly sorted then.
pub fn canonicalize_document(document: &mut Value) -> Result<()> {
    if !document.is_object() {
        return Err(TekError::Validation(
            "Exposure data must be a JSON object".to_string(),
        ));
    }
    sort_exposure_informations(sequence_mut(document, EXPOSURE_INFORMATIONS_FIELD)?)?;
    sort_daily_summaries(sequence_mut(document, DAILY_SUMMARIES_FIELD)?)?;
    sort_exposure_windows(sequence_mut(document, EXPOSURE_WINDOWS_FIELD)?)?;
    Ok(())
}
