//! Week-Pair Decomposer
//!
//! Splits each week-over-week change in the aggregate conversion rate into a
//! rate effect and a proportion effect per segment:
//!
//! ```text
//! rate_effect       = proportion_after * (rate_after - rate_before)
//! proportion_effect = rate_before * (proportion_after - proportion_before)
//! ```
//!
//! Phases are linear: enumerate segments, aggregate each week once, then
//! combine every segment's before/after aggregates. A single dimension is
//! the same code path as many.

use super::aggregator::{SegmentAggregator, SegmentWeekAggregate, WeekSlice};
use super::diagnostics::Diagnostic;
use super::enumerator::{DimensionEnumerator, SegmentKey};
use super::table::{DecompositionRow, DecompositionTable, PairSummary};
use crate::dataset::{Dataset, DimensionSpec, WeekPair};
use crate::error::{DecompError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation, checked between week pairs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecomposeOptions {
    pub cancel: Option<CancelFlag>,
}

#[derive(Default)]
pub struct Decomposer {
    options: DecomposeOptions,
    aggregator: SegmentAggregator,
}

impl Decomposer {
    pub fn new(options: DecomposeOptions) -> Self {
        Self {
            options,
            aggregator: SegmentAggregator,
        }
    }

    /// Decompose every consecutive week pair of `dataset` by `spec`.
    ///
    /// Unknown dimensions fail before any work starts. Fewer than two
    /// distinct weeks gives an empty table.
    pub fn decompose(&self, dataset: &Dataset, spec: &DimensionSpec) -> Result<DecompositionTable> {
        dataset.require_dimensions(spec)?;

        let enumerator = DimensionEnumerator::build(dataset, spec)?;
        let pairs = dataset.week_pairs()?;
        let dimensions = spec.names().to_vec();

        info!(
            "Decomposing by [{}]: {} segments x {} week pairs",
            dimensions.join(", "),
            enumerator.total_combinations(),
            pairs.len()
        );

        if pairs.is_empty() {
            info!("Fewer than two distinct weeks, nothing to decompose");
            return Ok(DecompositionTable::new(dimensions, Vec::new(), Vec::new(), Vec::new()));
        }

        let segments: Vec<SegmentKey> = enumerator.segments().collect();
        let mut rows = Vec::with_capacity(segments.len() * pairs.len());
        let mut summaries = Vec::with_capacity(pairs.len());
        let mut diagnostics = Vec::new();
        let mut zero_weeks_reported = HashSet::new();
        let mut previous: Option<WeekSlice> = None;

        for pair in pairs {
            self.check_cancelled(pair)?;

            let before = match previous.take() {
                Some(slice) if slice.week == pair.week_before => slice,
                _ => self.aggregator.week_slice(dataset, pair.week_before, &dimensions)?,
            };
            let after = self.aggregator.week_slice(dataset, pair.week_after, &dimensions)?;

            for slice in [&before, &after] {
                if slice.total.visits <= 0 && zero_weeks_reported.insert(slice.week) {
                    let diagnostic = Diagnostic::ZeroWeekTraffic { week: slice.week };
                    warn!("⚠️  {}", diagnostic);
                    diagnostics.push(diagnostic);
                }
            }

            let first_row = rows.len();
            for segment in &segments {
                match decompose_segment(segment, pair, &before, &after) {
                    Ok(row) => rows.push(row),
                    Err(err) => {
                        let diagnostic = Diagnostic::SegmentSkipped {
                            segment: segment.clone(),
                            pair,
                            reason: err.to_string(),
                        };
                        warn!("⚠️  {}", diagnostic);
                        diagnostics.push(diagnostic);
                    }
                }
            }

            let summary = PairSummary::new(pair, before.total, after.total, &rows[first_row..]);
            debug!(
                "Week pair {}: rate {:.6} -> {:.6}, residual {:.3e}, {} observed segments",
                pair,
                summary.rate_before,
                summary.rate_after,
                summary.residual,
                after.observed_segments()
            );
            summaries.push(summary);

            previous = Some(after);
        }

        info!(
            "✅ Decomposition produced {} rows ({} diagnostics)",
            rows.len(),
            diagnostics.len()
        );

        Ok(DecompositionTable::new(dimensions, rows, summaries, diagnostics))
    }

    fn check_cancelled(&self, pair: WeekPair) -> Result<()> {
        match &self.options.cancel {
            Some(flag) if flag.is_cancelled() => Err(DecompError::Cancelled {
                week_before: pair.week_before,
                week_after: pair.week_after,
            }),
            _ => Ok(()),
        }
    }
}

/// Compute one segment's row for one week pair.
pub fn decompose_segment(
    segment: &SegmentKey,
    pair: WeekPair,
    before: &WeekSlice,
    after: &WeekSlice,
) -> Result<DecompositionRow> {
    let values = segment.values();
    let before_agg = SegmentWeekAggregate::from_totals(before.totals_for(&values), before.total.visits)?;
    let after_agg = SegmentWeekAggregate::from_totals(after.totals_for(&values), after.total.visits)?;

    let rate_effect = after_agg.proportion * (after_agg.rate - before_agg.rate);
    let proportion_effect = before_agg.rate * (after_agg.proportion - before_agg.proportion);

    if !rate_effect.is_finite() || !proportion_effect.is_finite() {
        return Err(DecompError::Segment(format!(
            "non-finite effect (rate {}, proportion {})",
            rate_effect, proportion_effect
        )));
    }

    Ok(DecompositionRow {
        segment: segment.clone(),
        pair,
        rate_effect,
        proportion_effect,
        before: before_agg,
        after: after_agg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MetricRecord;
    use polars::prelude::*;

    const EPS: f64 = 1e-12;

    fn by_country(records: &[(i64, &str, u64, u64)]) -> Dataset {
        let records: Vec<MetricRecord> = records
            .iter()
            .map(|(week, country, visits, conversions)| {
                MetricRecord::new(*week, &[("country", *country)], *visits, *conversions)
            })
            .collect();
        Dataset::from_records(&records).unwrap()
    }

    fn country() -> DimensionSpec {
        DimensionSpec::new(["country"]).unwrap()
    }

    #[test]
    fn test_two_segment_analytic_values() {
        // week 1: A 100 visits @ 10%, B 100 visits @ 20% -> aggregate 15%
        // week 2: A 300 visits @ 20%, B 100 visits @ 20% -> aggregate 20%
        let dataset = by_country(&[
            (1, "A", 100, 10),
            (1, "B", 100, 20),
            (2, "A", 300, 60),
            (2, "B", 100, 20),
        ]);
        let table = Decomposer::default().decompose(&dataset, &country()).unwrap();
        let pair = WeekPair::new(1, 2);

        let a = table.row_by_values(&["A"], pair).unwrap();
        assert!((a.rate_effect - 0.75 * 0.10).abs() < EPS);
        assert!((a.proportion_effect - 0.10 * 0.25).abs() < EPS);

        let b = table.row_by_values(&["B"], pair).unwrap();
        assert!(b.rate_effect.abs() < EPS);
        assert!((b.proportion_effect - 0.20 * -0.25).abs() < EPS);

        let summary = &table.pair_summaries()[0];
        assert!((summary.rate_change - 0.05).abs() < EPS);
        assert!((a.total_effect() + b.total_effect() - summary.rate_change).abs() < 1e-9);
        assert!(summary.residual.abs() < 1e-9);
    }

    #[test]
    fn test_single_week_yields_empty_table() {
        let dataset = by_country(&[(3, "A", 10, 1), (3, "B", 10, 1)]);
        let table = Decomposer::default().decompose(&dataset, &country()).unwrap();
        assert!(table.is_empty());
        assert!(table.week_pairs().is_empty());
    }

    #[test]
    fn test_zero_traffic_week_degrades_to_zero() {
        let dataset = by_country(&[(1, "A", 0, 0), (1, "B", 0, 0), (2, "A", 10, 5), (2, "B", 30, 3)]);
        let table = Decomposer::default().decompose(&dataset, &country()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.diagnostics(), &[Diagnostic::ZeroWeekTraffic { week: 1 }]);
        for row in table.rows() {
            assert_eq!(row.before.proportion, 0.0);
            assert_eq!(row.before.rate, 0.0);
            assert_eq!(row.proportion_effect, 0.0);
        }
    }

    #[test]
    fn test_negative_visits_isolated_to_one_segment() {
        let frame = df! [
            "week" => [1i64, 1, 2, 2],
            "country" => ["A", "B", "A", "B"],
            "visits" => [100i64, -5, 100, 50],
            "conversions" => [10i64, 1, 20, 5]
        ]
        .unwrap();
        let dataset = Dataset::from_frame(frame).unwrap();
        let table = Decomposer::default().decompose(&dataset, &country()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].segment.values(), vec!["A"]);
        let skipped: Vec<_> = table.diagnostics().iter().filter(|d| d.is_segment_skip()).collect();
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_missing_dimension_fails_before_work() {
        let dataset = by_country(&[(1, "A", 10, 1), (2, "A", 10, 2)]);
        let spec = DimensionSpec::new(["browser"]).unwrap();
        assert!(matches!(
            Decomposer::default().decompose(&dataset, &spec),
            Err(DecompError::MissingDimension(_))
        ));
    }

    #[test]
    fn test_cancel_flag_checked_between_pairs() {
        let dataset = by_country(&[(1, "A", 10, 1), (2, "A", 10, 2), (3, "A", 10, 3)]);
        let flag = CancelFlag::new();
        flag.cancel();
        let decomposer = Decomposer::new(DecomposeOptions { cancel: Some(flag) });

        match decomposer.decompose(&dataset, &country()) {
            Err(DecompError::Cancelled { week_before, week_after }) => {
                assert_eq!((week_before, week_after), (1, 2));
            }
            other => panic!("expected cancellation, got {:?}", other.map(|t| t.len())),
        }
    }
}
