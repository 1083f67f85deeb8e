#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexLabel {
    Int64(i64),
    Utf8(String),
}

impl From<i64> for IndexLabel {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    labels: Vec<IndexLabel>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("cannot materialize a range index of length {len} on this platform")]
    RangeTooLarge { len: usize },
    #[error("index position {position} out of bounds for length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
}

impl Index {
    #[must_use]
    pub fn new(labels: Vec<IndexLabel>) -> Self {
        Self { labels }
    }

    /// `0..len` as `Int64` labels, the default row index of a frame.
    pub fn range(len: usize) -> Result<Self, IndexError> {
        let end = i64::try_from(len).map_err(|_| IndexError::RangeTooLarge { len })?;
        Ok(Self::new((0..end).map(IndexLabel::from).collect()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[IndexLabel] {
        &self.labels
    }

    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        let mut seen = HashSet::<&IndexLabel>::with_capacity(self.labels.len());
        self.labels.iter().any(|label| !seen.insert(label))
    }

    /// Labels that occur more than once, each reported once in first-seen order.
    #[must_use]
    pub fn duplicate_labels(&self) -> Vec<IndexLabel> {
        let mut seen = HashSet::<&IndexLabel>::with_capacity(self.labels.len());
        let mut reported = HashSet::<&IndexLabel>::new();
        let mut out = Vec::new();
        for label in &self.labels {
            if !seen.insert(label) && reported.insert(label) {
                out.push(label.clone());
            }
        }
        out
    }

    #[must_use]
    pub fn position_map_first(&self) -> HashMap<&IndexLabel, usize> {
        let mut positions = HashMap::with_capacity(self.labels.len());
        for (idx, label) in self.labels.iter().enumerate() {
            positions.entry(label).or_insert(idx);
        }
        positions
    }

    pub fn take(&self, positions: &[usize]) -> Result<Self, IndexError> {
        let labels = positions
            .iter()
            .map(|&position| {
                self.labels
                    .get(position)
                    .cloned()
                    .ok_or(IndexError::PositionOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::{Index, IndexError, IndexLabel};

    #[test]
    fn range_index_counts_from_zero() {
        let index = Index::range(3).expect("range");
        assert_eq!(
            index.labels(),
            &[IndexLabel::Int64(0), IndexLabel::Int64(1), IndexLabel::Int64(2)]
        );
        assert!(Index::range(0).expect("empty").is_empty());
    }

    #[test]
    fn duplicate_detection_matches_index_surface() {
        let index = Index::new(vec!["a".into(), "a".into(), "b".into()]);
        assert!(index.has_duplicates());
        assert!(!Index::new(vec![1_i64.into(), 2_i64.into()]).has_duplicates());
    }

    #[test]
    fn duplicate_labels_are_reported_once_in_first_seen_order() {
        let index = Index::new(vec![
            3_i64.into(),
            1_i64.into(),
            3_i64.into(),
            1_i64.into(),
            3_i64.into(),
            2_i64.into(),
        ]);
        assert_eq!(
            index.duplicate_labels(),
            vec![IndexLabel::Int64(3), IndexLabel::Int64(1)]
        );
    }

    #[test]
    fn position_map_keeps_first_occurrence() {
        let index = Index::new(vec!["x".into(), "y".into(), "x".into()]);
        let positions = index.position_map_first();
        assert_eq!(positions.get(&IndexLabel::from("x")), Some(&0));
        assert_eq!(positions.get(&IndexLabel::from("y")), Some(&1));
    }

    #[test]
    fn take_reorders_and_bounds_checks() {
        let index = Index::new(vec!["a".into(), "b".into()]);
        let out = index.take(&[1, 0, 1]).expect("take");
        assert_eq!(out.labels(), &["b".into(), "a".into(), "b".into()]);
        assert_eq!(
            index.take(&[2]).expect_err("out of range"),
            IndexError::PositionOutOfBounds { position: 2, len: 2 }
        );
    }
}
