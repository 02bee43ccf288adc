//! Word-occurrence histograms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from word to occurrence count.
///
/// Backed by an ordered map so the JSON form is stable across reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct Histogram(BTreeMap<String, u64>);

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for `word`, zero when absent.
    pub fn get(&self, word: &str) -> u64 {
        self.0.get(word).copied().unwrap_or(0)
    }

    /// Add one occurrence of `word` and return the new count.
    pub fn increment(&mut self, word: &str) -> u64 {
        let count = self.0.entry(word.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Overwrite the count for `word`.
    pub fn insert(&mut self, word: impl Into<String>, count: u64) {
        self.0.insert(word.into(), count);
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(word, count)| (word.as_str(), *count))
    }
}

impl From<BTreeMap<String, u64>> for Histogram {
    fn from(map: BTreeMap<String, u64>) -> Self {
        Self(map)
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Histogram {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(w, c)| (w.into(), c)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_get() {
        let mut histogram = Histogram::new();
        assert_eq!(histogram.increment("selva"), 1);
        assert_eq!(histogram.increment("selva"), 2);
        assert_eq!(histogram.get("selva"), 2);
        assert_eq!(histogram.get("oscura"), 0);
        assert_eq!(histogram.total(), 2);
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let histogram: Histogram = [("b", 1), ("a", 2)].into_iter().collect();
        let json = serde_json::to_string(&histogram).unwrap();
        assert_eq!(json, r#"{"a":2,"b":1}"#);

        let back: Histogram = serde_json::from_str(&json).unwrap();
        assert_eq!(back, histogram);
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = Histogram::new();
        assert!(histogram.is_empty());
        assert_eq!(serde_json::to_string(&histogram).unwrap(), "{}");
    }
}
