use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SECS_PER_DAY: f64 = 86_400.0;

/// Append-only `label -> seconds` ledger.
///
/// Labels are `YYYY-MM-DD` for calendar days and `YYYY-MM-DD HH:MM:SS` for
/// fixed-interval cycles, so lexical order is chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, f64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `seconds` to `label`, creating it if needed.
    pub fn add(&mut self, label: &str, seconds: f64) {
        *self.entries.entry(label.to_string()).or_insert(0.0) += seconds;
    }

    /// Overwrites `label`.
    pub fn set(&mut self, label: &str, seconds: f64) {
        self.entries.insert(label.to_string(), seconds);
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn total_seconds(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Hours per entry, in label order.
    pub fn hours(&self) -> Vec<f64> {
        self.entries.values().map(|s| s / 3600.0).collect()
    }

    /// `(days since epoch, hours)` plot points for every entry whose label
    /// parses as a date or datetime.
    pub fn series(&self) -> Vec<(f64, f64)> {
        self.iter()
            .filter_map(|(label, secs)| label_to_days(label).map(|t| (t, secs / 3600.0)))
            .collect()
    }
}

impl FromIterator<(String, f64)> for Ledger {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Days since the unix epoch for a ledger label, or `None` if unparseable.
pub fn label_to_days(label: &str) -> Option<f64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(label, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp() as f64 / SECS_PER_DAY);
    }
    NaiveDate::parse_from_str(label, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp() as f64 / SECS_PER_DAY)
}
