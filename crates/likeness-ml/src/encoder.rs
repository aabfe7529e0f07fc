//! Identity label encoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown label: {0}")]
pub struct UnknownLabel(pub String);

/// Bijective map between identity names and dense integer labels.
///
/// Classes are sorted lexicographically at fit time, so the mapping is
/// stable for a given identity set regardless of observation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit over the observed identity names; duplicates collapse.
    pub fn fit(names: &[String]) -> Self {
        let mut classes = names.to_vec();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// The fitted class names, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode one identity name.
    pub fn encode(&self, name: &str) -> Result<usize, UnknownLabel> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(name))
            .map_err(|_| UnknownLabel(name.to_string()))
    }

    /// Encode a batch of identity names.
    pub fn transform(&self, names: &[String]) -> Result<Vec<usize>, UnknownLabel> {
        names.iter().map(|name| self.encode(name)).collect()
    }

    /// Decode an integer label back to its identity name.
    pub fn decode(&self, label: usize) -> Result<&str, UnknownLabel> {
        self.classes
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| UnknownLabel(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classes_sorted_and_deduped() {
        let encoder = LabelEncoder::fit(&names(&["zoe", "ada", "zoe", "mia", "ada"]));
        assert_eq!(encoder.classes(), &["ada", "mia", "zoe"]);
        assert_eq!(encoder.n_classes(), 3);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let fitted = names(&["carol", "alice", "bob"]);
        let encoder = LabelEncoder::fit(&fitted);
        for name in &fitted {
            let label = encoder.encode(name).unwrap();
            assert_eq!(encoder.decode(label).unwrap(), name);
        }
    }

    #[test]
    fn test_encoding_is_observation_order_independent() {
        let a = LabelEncoder::fit(&names(&["bob", "alice"]));
        let b = LabelEncoder::fit(&names(&["alice", "bob"]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_name_errors() {
        let encoder = LabelEncoder::fit(&names(&["alice"]));
        assert_eq!(
            encoder.encode("mallory"),
            Err(UnknownLabel("mallory".into()))
        );
    }

    #[test]
    fn test_out_of_range_label_errors() {
        let encoder = LabelEncoder::fit(&names(&["alice"]));
        assert!(encoder.decode(1).is_err());
    }

    #[test]
    fn test_transform_batch() {
        let encoder = LabelEncoder::fit(&names(&["a", "b", "c"]));
        let labels = encoder.transform(&names(&["c", "a", "c"])).unwrap();
        assert_eq!(labels, vec![2, 0, 2]);
    }

    #[test]
    fn test_json_roundtrip() {
        let encoder = LabelEncoder::fit(&names(&["ada", "zoe"]));
        let json = serde_json::to_string(&encoder).unwrap();
        let restored: LabelEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, encoder);
    }
}
