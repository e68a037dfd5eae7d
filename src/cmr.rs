use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Fields printed by [`CmrEntry::describe`] when none are given.
pub const DEFAULT_FIELDS: [&str; 2] = ["dataset_id", "version_id"];

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FeedResponse {
    pub feed: Feed,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Feed {
    #[serde(default)]
    pub entry: Vec<CmrEntry>,
}

/// One collection or granule entry of a CMR JSON feed.
///
/// CMR entries carry many optional fields, so the raw object is kept and the
/// commonly used ones get accessors.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CmrEntry(pub Map<String, Value>);

impl CmrEntry {
    /// A field rendered as a string; numbers and booleans are stringified.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            v => Some(v.to_string()),
        }
    }

    pub fn dataset_id(&self) -> Option<String> {
        self.field("dataset_id")
    }

    pub fn version_id(&self) -> Option<String> {
        self.field("version_id")
    }

    pub fn title(&self) -> Option<String> {
        self.field("title")
    }

    /// Granule size in MB. CMR reports it as a string or a number.
    pub fn granule_size_mb(&self) -> Option<f64> {
        match self.0.get("granule_size")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `dataset_id: ..., version_id: ...` style one-liner. Missing fields show as `n/a`.
    pub fn describe(&self, fields: &[&str]) -> String {
        fields
            .iter()
            .map(|f| {
                let v = self.field(f).unwrap_or_else(|| "n/a".to_string());
                format!("{f}: {v}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Highest `version_id` among collection entries.
///
/// Ids that both parse as integers compare numerically (`"10"` beats `"9"`),
/// anything else compares as text.
pub fn latest_version(entries: &[CmrEntry]) -> Option<String> {
    entries
        .iter()
        .filter_map(|e| e.version_id())
        .max_by(|a, b| compare_versions(a, b))
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Granules matching a search, with size totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GranuleSummary {
    pub entries: Vec<CmrEntry>,
}

impl GranuleSummary {
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_size_mb(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.granule_size_mb()).sum()
    }

    pub fn mean_size_mb(&self) -> Option<f64> {
        let sizes: Vec<f64> = self.entries.iter().filter_map(|e| e.granule_size_mb()).collect();
        if sizes.is_empty() {
            None
        } else {
            Some(sizes.iter().sum::<f64>() / sizes.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(v: Value) -> CmrEntry {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn describe_uses_requested_fields() {
        let e = entry(json!({"dataset_id": "ATLAS/ICESat-2 L3A Sea Ice Height V002", "version_id": "002"}));
        assert_eq!(
            e.describe(&DEFAULT_FIELDS),
            "dataset_id: ATLAS/ICESat-2 L3A Sea Ice Height V002, version_id: 002"
        );
        assert_eq!(e.describe(&["version_id", "summary"]), "version_id: 002, summary: n/a");
    }

    #[test]
    fn granule_sizes_accept_strings_and_numbers() {
        let summary = GranuleSummary {
            entries: vec![
                entry(json!({"granule_size": "260.5"})),
                entry(json!({"granule_size": 300})),
                entry(json!({"title": "no size"})),
            ],
        };
        assert_eq!(summary.count(), 3);
        assert!((summary.total_size_mb() - 560.5).abs() < 1e-9);
        assert!((summary.mean_size_mb().unwrap() - 280.25).abs() < 1e-9);
        assert_eq!(GranuleSummary::default().mean_size_mb(), None);
    }

    #[test]
    fn latest_version_is_the_maximum() {
        let entries = vec![
            entry(json!({"version_id": "001"})),
            entry(json!({"version_id": "003"})),
            entry(json!({"version_id": "002"})),
        ];
        assert_eq!(latest_version(&entries).as_deref(), Some("003"));
        assert_eq!(latest_version(&[]), None);

        let entries = vec![
            entry(json!({"version_id": "9"})),
            entry(json!({"version_id": "10"})),
            entry(json!({"version_id": "002"})),
        ];
        assert_eq!(latest_version(&entries).as_deref(), Some("10"));
    }

    #[test]
    fn feed_without_entries_is_empty() {
        let feed: FeedResponse = serde_json::from_str(r#"{"feed": {"id": "x"}}"#).unwrap();
        assert!(feed.feed.entry.is_empty());
    }
}
