//! Segment Aggregation
//!
//! Sums visits and conversions for a segment in one week and derives the
//! segment's conversion rate and its share of the week's traffic.
//!
//! Two access paths over the same data:
//! - `aggregate` evaluates a structured predicate (conjunction of equality
//!   checks) for a single segment;
//! - `week_slice` runs one grouped query per week and serves every segment
//!   of the cartesian product from the result, phantoms included.

use super::enumerator::SegmentKey;
use crate::dataset::{Dataset, CONVERSIONS_COLUMN, NULL_DIMENSION_VALUE, VISITS_COLUMN, WEEK_COLUMN};
use crate::error::{DecompError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw sums for one segment/week, as read from the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTotals {
    pub visits: i64,
    pub conversions: i64,
}

/// Derived, validated view of a segment in one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentWeekAggregate {
    pub visits: u64,
    pub conversions: u64,

    /// conversions / visits, 0 when visits is 0
    pub rate: f64,

    /// visits / week total visits, 0 when the week has no traffic
    pub proportion: f64,
}

impl SegmentWeekAggregate {
    /// Validate raw totals and derive rate and proportion.
    ///
    /// Negative sums are malformed input and rejected; the caller isolates
    /// the segment instead of aborting the batch.
    pub fn from_totals(totals: SegmentTotals, week_total_visits: i64) -> Result<Self> {
        let visits = u64::try_from(totals.visits).map_err(|_| {
            DecompError::Segment(format!("negative visit total {}", totals.visits))
        })?;
        let conversions = u64::try_from(totals.conversions).map_err(|_| {
            DecompError::Segment(format!("negative conversion total {}", totals.conversions))
        })?;

        Ok(Self {
            visits,
            conversions,
            rate: rate(visits, conversions),
            proportion: proportion(visits, week_total_visits),
        })
    }
}

/// Conversion rate with an explicit zero for empty segments.
pub fn rate(visits: u64, conversions: u64) -> f64 {
    if visits > 0 {
        conversions as f64 / visits as f64
    } else {
        0.0
    }
}

/// Traffic share with an explicit zero for weeks without traffic.
pub fn proportion(visits: u64, week_total_visits: i64) -> f64 {
    if week_total_visits > 0 {
        visits as f64 / week_total_visits as f64
    } else {
        0.0
    }
}

/// Conjunction of `dimension == value` checks. An empty key matches every row.
pub fn segment_predicate(key: &SegmentKey) -> Expr {
    key.pairs()
        .iter()
        .map(|(dimension, value)| col(dimension.as_str()).eq(lit(value.as_str())))
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit(true))
}

/// Every segment's totals for one week, keyed by value tuple in dimension order.
#[derive(Debug, Clone)]
pub struct WeekSlice {
    pub week: i64,

    /// Whole-week totals (all rows of the week)
    pub total: SegmentTotals,

    by_values: HashMap<Vec<String>, SegmentTotals>,
}

impl WeekSlice {
    /// Totals for one value tuple; zero for phantom segments.
    pub fn totals_for(&self, values: &[&str]) -> SegmentTotals {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.by_values.get(&key).copied().unwrap_or_default()
    }

    /// Number of segments with at least one row this week.
    pub fn observed_segments(&self) -> usize {
        self.by_values.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentAggregator;

impl SegmentAggregator {
    /// Sum visits and conversions of the rows in `week` matching `key`.
    pub fn aggregate(&self, dataset: &Dataset, week: i64, key: &SegmentKey) -> Result<SegmentTotals> {
        let filter = col(WEEK_COLUMN).eq(lit(week)).and(segment_predicate(key));

        let summed = dataset
            .frame()
            .clone()
            .lazy()
            .filter(filter)
            .select([col(VISITS_COLUMN).sum(), col(CONVERSIONS_COLUMN).sum()])
            .collect()?;

        Ok(SegmentTotals {
            visits: summed.column(VISITS_COLUMN)?.i64()?.get(0).unwrap_or(0),
            conversions: summed.column(CONVERSIONS_COLUMN)?.i64()?.get(0).unwrap_or(0),
        })
    }

    /// Total visits of the whole dataset in `week`.
    pub fn week_total_visits(&self, dataset: &Dataset, week: i64) -> Result<i64> {
        Ok(self.aggregate(dataset, week, &SegmentKey::new(Vec::new()))?.visits)
    }

    /// One grouped query for `week` over `dimensions`.
    pub fn week_slice(&self, dataset: &Dataset, week: i64, dimensions: &[String]) -> Result<WeekSlice> {
        let keys: Vec<Expr> = dimensions.iter().map(|d| col(d.as_str())).collect();

        let grouped = dataset
            .frame()
            .clone()
            .lazy()
            .filter(col(WEEK_COLUMN).eq(lit(week)))
            .group_by(keys)
            .agg([col(VISITS_COLUMN).sum(), col(CONVERSIONS_COLUMN).sum()])
            .collect()?;

        let dimension_columns = dimensions
            .iter()
            .map(|d| grouped.column(d.as_str()).and_then(|s| s.str()))
            .collect::<PolarsResult<Vec<_>>>()?;
        let visits = grouped.column(VISITS_COLUMN)?.i64()?;
        let conversions = grouped.column(CONVERSIONS_COLUMN)?.i64()?;

        let mut total = SegmentTotals::default();
        let mut by_values = HashMap::with_capacity(grouped.height());

        for row in 0..grouped.height() {
            let values: Vec<String> = dimension_columns
                .iter()
                .map(|c| c.get(row).unwrap_or(NULL_DIMENSION_VALUE).to_string())
                .collect();
            let totals = SegmentTotals {
                visits: visits.get(row).unwrap_or(0),
                conversions: conversions.get(row).unwrap_or(0),
            };
            total.visits += totals.visits;
            total.conversions += totals.conversions;
            by_values.insert(values, totals);
        }

        Ok(WeekSlice {
            week,
            total,
            by_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MetricRecord;

    fn dataset() -> Dataset {
        Dataset::from_records(&[
            MetricRecord::new(1, &[("country", "A"), ("browser", "Chrome")], 1000, 100),
            MetricRecord::new(1, &[("country", "A"), ("browser", "Chrome")], 500, 20),
            MetricRecord::new(1, &[("country", "B"), ("browser", "Firefox")], 1500, 150),
            MetricRecord::new(2, &[("country", "A"), ("browser", "Chrome")], 2000, 200),
        ])
        .unwrap()
    }

    fn key(pairs: &[(&str, &str)]) -> SegmentKey {
        SegmentKey::new(pairs.iter().map(|(d, v)| (d.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_rate_and_proportion_zero_guards() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(200, 50), 0.25);
        assert_eq!(proportion(10, 0), 0.0);
        assert_eq!(proportion(10, 40), 0.25);
    }

    #[test]
    fn test_aggregate_matches_all_pairs() {
        let aggregator = SegmentAggregator;
        let totals = aggregator
            .aggregate(&dataset(), 1, &key(&[("country", "A"), ("browser", "Chrome")]))
            .unwrap();
        assert_eq!(totals, SegmentTotals { visits: 1500, conversions: 120 });

        let phantom = aggregator
            .aggregate(&dataset(), 1, &key(&[("country", "A"), ("browser", "Firefox")]))
            .unwrap();
        assert_eq!(phantom, SegmentTotals::default());

        assert_eq!(aggregator.week_total_visits(&dataset(), 1).unwrap(), 3000);
        assert_eq!(aggregator.week_total_visits(&dataset(), 9).unwrap(), 0);
    }

    #[test]
    fn test_week_slice_agrees_with_point_queries() {
        let aggregator = SegmentAggregator;
        let dims = vec!["country".to_string(), "browser".to_string()];
        let slice = aggregator.week_slice(&dataset(), 1, &dims).unwrap();

        assert_eq!(slice.total.visits, 3000);
        assert_eq!(slice.observed_segments(), 2);
        for values in [["A", "Chrome"], ["B", "Firefox"], ["B", "Chrome"]] {
            let point = aggregator
                .aggregate(&dataset(), 1, &key(&[("country", values[0]), ("browser", values[1])]))
                .unwrap();
            assert_eq!(slice.totals_for(&values), point);
        }
    }

    #[test]
    fn test_from_totals_rejects_negative_sums() {
        let bad = SegmentTotals { visits: -5, conversions: 1 };
        assert!(matches!(
            SegmentWeekAggregate::from_totals(bad, 100),
            Err(DecompError::Segment(_))
        ));

        let ok = SegmentWeekAggregate::from_totals(SegmentTotals { visits: 50, conversions: 5 }, 200).unwrap();
        assert_eq!(ok.rate, 0.1);
        assert_eq!(ok.proportion, 0.25);
    }
}
