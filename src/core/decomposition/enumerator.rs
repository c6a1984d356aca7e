//! Dimension Enumerator
//!
//! Builds the cartesian product of every requested dimension's distinct
//! values and addresses it with a mixed-radix integer: the last dimension is
//! the least significant digit, so it varies fastest.

use crate::dataset::{Dataset, DimensionSpec};
use crate::error::{DecompError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One combination of dimension values, in dimension order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pairs: Vec<(String, String)>,
}

impl SegmentKey {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(d, _)| d.as_str())
    }

    pub fn values(&self) -> Vec<&str> {
        self.pairs.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn value_of(&self, dimension: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(d, _)| d == dimension)
            .map(|(_, v)| v.as_str())
    }

    /// Display label joining the values; not an identity.
    pub fn label(&self, separator: &str) -> String {
        self.values().join(separator)
    }

    /// Same pairs ordered by dimension name, independent of dimension order.
    pub fn canonical(&self) -> Vec<(String, String)> {
        let mut pairs = self.pairs.clone();
        pairs.sort();
        pairs
    }
}

impl Ord for SegmentKey {
    /// Lexicographic over the value tuple, then dimension names.
    fn cmp(&self, other: &Self) -> Ordering {
        self.values()
            .cmp(&other.values())
            .then_with(|| self.dimensions().cmp(other.dimensions()))
    }
}

impl PartialOrd for SegmentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .pairs
            .iter()
            .map(|(d, v)| format!("{}={}", d, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Mixed-radix view over the cartesian product of dimension values.
#[derive(Debug, Clone)]
pub struct DimensionEnumerator {
    dimensions: Vec<String>,
    value_lists: Vec<Vec<String>>,
    total: usize,
}

impl DimensionEnumerator {
    /// Collect each dimension's distinct values over the whole dataset
    /// (not per week), sorted.
    pub fn build(dataset: &Dataset, spec: &DimensionSpec) -> Result<Self> {
        dataset.require_dimensions(spec)?;

        let value_lists = spec
            .names()
            .iter()
            .map(|name| dataset.distinct_values(name))
            .collect::<Result<Vec<_>>>()?;

        Self::from_value_lists(spec.names().to_vec(), value_lists)
    }

    pub fn from_value_lists(dimensions: Vec<String>, value_lists: Vec<Vec<String>>) -> Result<Self> {
        if dimensions.len() != value_lists.len() {
            return Err(DecompError::Config(format!(
                "{} dimension names but {} value lists",
                dimensions.len(),
                value_lists.len()
            )));
        }

        let total = value_lists.iter().try_fold(1usize, |acc, list| {
            acc.checked_mul(list.len()).ok_or_else(|| {
                DecompError::Config("segment count overflows usize".to_string())
            })
        })?;

        Ok(Self {
            dimensions,
            value_lists,
            total,
        })
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn value_lists(&self) -> &[Vec<String>] {
        &self.value_lists
    }

    /// Product of the value list lengths. Zero when any dimension has no values.
    pub fn total_combinations(&self) -> usize {
        self.total
    }

    /// Decode `position` into one value per dimension.
    pub fn combination_at(&self, position: usize) -> Result<Vec<&str>> {
        if position >= self.total {
            return Err(DecompError::Segment(format!(
                "position {} is outside [0, {})",
                position, self.total
            )));
        }

        let mut remainder = position;
        let mut combination = vec![""; self.value_lists.len()];
        for (slot, list) in combination.iter_mut().zip(&self.value_lists).rev() {
            *slot = list[remainder % list.len()].as_str();
            remainder /= list.len();
        }
        Ok(combination)
    }

    pub fn segment_at(&self, position: usize) -> Result<SegmentKey> {
        let values = self.combination_at(position)?;
        Ok(SegmentKey::new(
            self.dimensions
                .iter()
                .zip(values)
                .map(|(d, v)| (d.clone(), v.to_string()))
                .collect(),
        ))
    }

    /// All segments in position order.
    pub fn segments(&self) -> impl Iterator<Item = SegmentKey> + '_ {
        (0..self.total).filter_map(move |position| self.segment_at(position).ok())
    }
}
