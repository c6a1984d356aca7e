//! Decomposition Result Table
//!
//! Flat, immutable collection of one row per (segment, week pair), plus the
//! per-pair aggregate summaries and the diagnostics raised on the way.

use super::aggregator::{SegmentTotals, SegmentWeekAggregate};
use super::diagnostics::Diagnostic;
use super::enumerator::SegmentKey;
use crate::dataset::WeekPair;
use crate::error::{DecompError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const WEEK_BEFORE_COLUMN: &str = "week_before";
pub const WEEK_AFTER_COLUMN: &str = "week_after";
pub const RATE_EFFECT_COLUMN: &str = "rate_change_effect";
pub const PROPORTION_EFFECT_COLUMN: &str = "proportion_change_effect";

/// One segment's share of a week-over-week rate change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionRow {
    pub segment: SegmentKey,
    pub pair: WeekPair,

    /// proportion_after * (rate_after - rate_before)
    pub rate_effect: f64,

    /// rate_before * (proportion_after - proportion_before)
    pub proportion_effect: f64,

    pub before: SegmentWeekAggregate,
    pub after: SegmentWeekAggregate,
}

impl DecompositionRow {
    pub fn total_effect(&self) -> f64 {
        self.rate_effect + self.proportion_effect
    }

    /// No rows in either week.
    pub fn is_phantom(&self) -> bool {
        self.before.visits == 0 && self.after.visits == 0
    }
}

/// Whole-dataset view of one week pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub pair: WeekPair,
    pub rate_before: f64,
    pub rate_after: f64,

    /// rate_after - rate_before
    pub rate_change: f64,

    pub rate_effect_sum: f64,
    pub proportion_effect_sum: f64,

    /// rate_change minus both effect sums; nonzero only through rounding or
    /// skipped segments
    pub residual: f64,
}

impl PairSummary {
    pub fn new(pair: WeekPair, before: SegmentTotals, after: SegmentTotals, rows: &[DecompositionRow]) -> Self {
        let rate_before = aggregate_rate(before);
        let rate_after = aggregate_rate(after);
        let rate_effect_sum: f64 = rows.iter().map(|r| r.rate_effect).sum();
        let proportion_effect_sum: f64 = rows.iter().map(|r| r.proportion_effect).sum();
        let rate_change = rate_after - rate_before;

        Self {
            pair,
            rate_before,
            rate_after,
            rate_change,
            rate_effect_sum,
            proportion_effect_sum,
            residual: rate_change - rate_effect_sum - proportion_effect_sum,
        }
    }
}

fn aggregate_rate(totals: SegmentTotals) -> f64 {
    if totals.visits > 0 {
        totals.conversions as f64 / totals.visits as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecompositionTable {
    dimensions: Vec<String>,
    rows: Vec<DecompositionRow>,
    summaries: Vec<PairSummary>,
    diagnostics: Vec<Diagnostic>,
}

impl DecompositionTable {
    pub fn new(
        dimensions: Vec<String>,
        rows: Vec<DecompositionRow>,
        summaries: Vec<PairSummary>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            dimensions,
            rows,
            summaries,
            diagnostics,
        }
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn rows(&self) -> &[DecompositionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn week_pairs(&self) -> Vec<WeekPair> {
        self.summaries.iter().map(|s| s.pair).collect()
    }

    pub fn rows_for_pair(&self, pair: WeekPair) -> impl Iterator<Item = &DecompositionRow> {
        self.rows.iter().filter(move |r| r.pair == pair)
    }

    pub fn row(&self, segment: &SegmentKey, pair: WeekPair) -> Option<&DecompositionRow> {
        self.rows
            .iter()
            .find(|r| r.pair == pair && &r.segment == segment)
    }

    /// Look a row up by its values in dimension order.
    pub fn row_by_values(&self, values: &[&str], pair: WeekPair) -> Option<&DecompositionRow> {
        self.rows_for_pair(pair).find(|r| r.segment.values() == values)
    }

    pub fn total_rate_effect(&self) -> f64 {
        self.rows.iter().map(|r| r.rate_effect).sum()
    }

    pub fn total_proportion_effect(&self) -> f64 {
        self.rows.iter().map(|r| r.proportion_effect).sum()
    }

    pub fn pair_summaries(&self) -> &[PairSummary] {
        &self.summaries
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Column contract: one column per dimension, then `week_before`,
    /// `week_after`, `rate_change_effect`, `proportion_change_effect`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.dimensions.len() + 4);

        for (idx, dimension) in self.dimensions.iter().enumerate() {
            let values = self
                .rows
                .iter()
                .map(|r| match r.segment.pairs().get(idx) {
                    Some((name, value)) if name == dimension => Ok(value.as_str()),
                    _ => Err(DecompError::Schema(format!(
                        "segment [{}] has no value for dimension '{}' at position {}",
                        r.segment, dimension, idx
                    ))),
                })
                .collect::<Result<Vec<&str>>>()?;
            columns.push(Series::new(dimension.as_str(), values));
        }

        let week_before: Vec<i64> = self.rows.iter().map(|r| r.pair.week_before).collect();
        let week_after: Vec<i64> = self.rows.iter().map(|r| r.pair.week_after).collect();
        let rate_effect: Vec<f64> = self.rows.iter().map(|r| r.rate_effect).collect();
        let proportion_effect: Vec<f64> = self.rows.iter().map(|r| r.proportion_effect).collect();

        columns.push(Series::new(WEEK_BEFORE_COLUMN, week_before));
        columns.push(Series::new(WEEK_AFTER_COLUMN, week_after));
        columns.push(Series::new(RATE_EFFECT_COLUMN, rate_effect));
        columns.push(Series::new(PROPORTION_EFFECT_COLUMN, proportion_effect));

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> DecompositionRow {
        DecompositionRow {
            segment: SegmentKey::new(
                pairs
                    .iter()
                    .map(|(d, v)| (d.to_string(), v.to_string()))
                    .collect(),
            ),
            pair: WeekPair::new(1, 2),
            rate_effect: 0.01,
            proportion_effect: -0.02,
            before: SegmentWeekAggregate::default(),
            after: SegmentWeekAggregate::default(),
        }
    }

    #[test]
    fn test_to_dataframe_column_contract() {
        let table = DecompositionTable::new(
            vec!["country".to_string()],
            vec![row(&[("country", "US")]), row(&[("country", "DE")])],
            Vec::new(),
            Vec::new(),
        );
        let frame = table.to_dataframe().unwrap();
        assert_eq!(
            frame.get_column_names(),
            vec!["country", WEEK_BEFORE_COLUMN, WEEK_AFTER_COLUMN, RATE_EFFECT_COLUMN, PROPORTION_EFFECT_COLUMN]
        );
        assert_eq!(frame.height(), 2);
    }

    #[test]
    fn test_to_dataframe_rejects_rows_missing_a_dimension() {
        let short = DecompositionTable::new(
            vec!["country".to_string(), "browser".to_string()],
            vec![row(&[("country", "US")])],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(short.to_dataframe(), Err(DecompError::Schema(_))));

        let mismatched = DecompositionTable::new(
            vec!["country".to_string()],
            vec![row(&[("browser", "Chrome")])],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(mismatched.to_dataframe(), Err(DecompError::Schema(_))));
    }
}
