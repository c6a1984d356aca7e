//! Weekly aggregate conversion rate over the whole dataset.

use crate::core::decomposition::aggregator::rate;
use crate::dataset::{Dataset, CONVERSIONS_COLUMN, VISITS_COLUMN, WEEK_COLUMN};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub week: i64,
    pub weekly_visits: i64,
    pub weekly_conversions: i64,
    pub weekly_conversion_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyAggregates {
    pub weeks: Vec<WeeklyAggregate>,
}

impl WeeklyAggregates {
    /// One row per distinct week, ascending.
    pub fn compute(dataset: &Dataset) -> Result<Self> {
        let grouped = dataset
            .frame()
            .clone()
            .lazy()
            .group_by([col(WEEK_COLUMN)])
            .agg([col(VISITS_COLUMN).sum(), col(CONVERSIONS_COLUMN).sum()])
            .collect()?;

        let weeks = grouped.column(WEEK_COLUMN)?.i64()?;
        let visits = grouped.column(VISITS_COLUMN)?.i64()?;
        let conversions = grouped.column(CONVERSIONS_COLUMN)?.i64()?;

        let mut rows = Vec::with_capacity(grouped.height());
        for idx in 0..grouped.height() {
            let (Some(week), Some(v), Some(c)) = (weeks.get(idx), visits.get(idx), conversions.get(idx)) else {
                continue;
            };
            rows.push(WeeklyAggregate {
                week,
                weekly_visits: v,
                weekly_conversions: c,
                weekly_conversion_rate: rate(v.max(0) as u64, c.max(0) as u64),
            });
        }

        rows.sort_by_key(|w| w.week);
        Ok(Self { weeks: rows })
    }

    pub fn get(&self, week: i64) -> Option<&WeeklyAggregate> {
        self.weeks.iter().find(|w| w.week == week)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let df = df! [
            WEEK_COLUMN => self.weeks.iter().map(|w| w.week).collect::<Vec<_>>(),
            "weekly_visits" => self.weeks.iter().map(|w| w.weekly_visits).collect::<Vec<_>>(),
            "weekly_conversions" => self.weeks.iter().map(|w| w.weekly_conversions).collect::<Vec<_>>(),
            "weekly_conversion_rate" => self.weeks.iter().map(|w| w.weekly_conversion_rate).collect::<Vec<_>>()
        ]?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MetricRecord;

    #[test]
    fn test_weekly_rates_sorted_with_zero_guard() {
        let dataset = Dataset::from_records(&[
            MetricRecord::new(3, &[("country", "A")], 0, 0),
            MetricRecord::new(1, &[("country", "A")], 100, 10),
            MetricRecord::new(1, &[("country", "B")], 300, 50),
        ])
        .unwrap();

        let weekly = WeeklyAggregates::compute(&dataset).unwrap();
        let weeks: Vec<i64> = weekly.weeks.iter().map(|w| w.week).collect();
        assert_eq!(weeks, vec![1, 3]);

        let first = weekly.get(1).unwrap();
        assert_eq!(first.weekly_visits, 400);
        assert_eq!(first.weekly_conversions, 60);
        assert!((first.weekly_conversion_rate - 0.15).abs() < 1e-12);
        assert_eq!(weekly.get(3).unwrap().weekly_conversion_rate, 0.0);

        let frame = weekly.to_dataframe().unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.width(), 4);
    }
}
