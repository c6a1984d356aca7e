//! Metric Dataset
//!
//! Typed, read-only view over a weekly traffic table: one `week` column,
//! any number of categorical dimension columns, `visits` and `conversions`.
//! The table lives in a polars `DataFrame`; everything downstream queries it
//! with lazy expressions and never mutates it.

use crate::error::{DecompError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

pub const WEEK_COLUMN: &str = "week";
pub const VISITS_COLUMN: &str = "visits";
pub const CONVERSIONS_COLUMN: &str = "conversions";

/// Columns every dataset must carry; never usable as dimensions.
pub const RESERVED_COLUMNS: [&str; 3] = [WEEK_COLUMN, VISITS_COLUMN, CONVERSIONS_COLUMN];

/// Value substituted for null categorical cells so they form a regular segment.
pub const NULL_DIMENSION_VALUE: &str = "(null)";

fn is_reserved(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

/// One input row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub week: i64,

    /// Dimension name -> value (e.g. "country" -> "US")
    pub dimensions: BTreeMap<String, String>,

    pub visits: u64,

    /// Expected to be <= visits, not enforced
    pub conversions: u64,
}

impl MetricRecord {
    pub fn new(week: i64, dimensions: &[(&str, &str)], visits: u64, conversions: u64) -> Self {
        Self {
            week,
            dimensions: dimensions
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            visits,
            conversions,
        }
    }
}

/// Ordered list of dimension names to decompose by.
///
/// Order only drives column and label layout; the segment set is the same
/// for any permutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpec {
    names: Vec<String>,
}

impl DimensionSpec {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(DecompError::Config(
                "at least one dimension is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &names {
            if name.trim().is_empty() {
                return Err(DecompError::Config("dimension names cannot be blank".to_string()));
            }
            if is_reserved(name) {
                return Err(DecompError::Config(format!(
                    "'{}' is a reserved column and cannot be used as a dimension",
                    name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(DecompError::Config(format!("dimension '{}' is listed twice", name)));
            }
        }

        Ok(Self { names })
    }

    /// Parse a comma separated list such as `country,browser`.
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Two chronologically adjacent distinct weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekPair {
    pub week_before: i64,
    pub week_after: i64,
}

impl WeekPair {
    pub fn new(week_before: i64, week_after: i64) -> Self {
        Self {
            week_before,
            week_after,
        }
    }
}

impl fmt::Display for WeekPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.week_before, self.week_after)
    }
}

/// Read-only weekly metrics table.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    dimension_columns: Vec<String>,
}

impl Dataset {
    /// Wrap a frame after normalising its types.
    ///
    /// `week`, `visits` and `conversions` are strictly cast to Int64 and may
    /// not contain nulls or fractional values; every other column is treated as categorical and
    /// cast to String, with nulls replaced by [`NULL_DIMENSION_VALUE`].
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        for required in RESERVED_COLUMNS {
            if !columns.iter().any(|c| c == required) {
                return Err(DecompError::Schema(format!(
                    "missing required column '{}'",
                    required
                )));
            }
        }

        for required in RESERVED_COLUMNS {
            let column = frame.column(required)?;
            if column.dtype().is_float() {
                let values = column.cast(&DataType::Float64)?;
                if let Some(bad) = values
                    .f64()?
                    .into_iter()
                    .flatten()
                    .find(|v| !v.is_finite() || v.fract() != 0.0)
                {
                    return Err(DecompError::Schema(format!(
                        "column '{}' holds non-integer value {}",
                        required, bad
                    )));
                };
            }
        }

        let casts: Vec<Expr> = columns
            .iter()
            .map(|name| {
                if is_reserved(name) {
                    col(name.as_str()).strict_cast(DataType::Int64)
                } else {
                    col(name.as_str())
                        .cast(DataType::String)
                        .fill_null(lit(NULL_DIMENSION_VALUE))
                }
            })
            .collect();

        let frame = frame
            .lazy()
            .with_columns(casts)
            .collect()
            .map_err(|e| DecompError::Schema(format!("failed to normalise column types: {}", e)))?;

        for required in RESERVED_COLUMNS {
            let nulls = frame.column(required)?.null_count();
            if nulls > 0 {
                return Err(DecompError::Schema(format!(
                    "column '{}' has {} null value(s)",
                    required, nulls
                )));
            }
        }

        let dimension_columns = columns.into_iter().filter(|c| !is_reserved(c)).collect();

        Ok(Self {
            frame,
            dimension_columns,
        })
    }

    /// Build a dataset from typed records. All records must share one set of
    /// dimension names.
    pub fn from_records(records: &[MetricRecord]) -> Result<Self> {
        let dimension_names: Vec<String> = records
            .first()
            .map(|r| r.dimensions.keys().cloned().collect())
            .unwrap_or_default();

        let mut weeks = Vec::with_capacity(records.len());
        let mut visits = Vec::with_capacity(records.len());
        let mut conversions = Vec::with_capacity(records.len());
        let mut dimension_values: Vec<Vec<String>> =
            vec![Vec::with_capacity(records.len()); dimension_names.len()];

        for (idx, record) in records.iter().enumerate() {
            if record.dimensions.len() != dimension_names.len()
                || !dimension_names.iter().all(|d| record.dimensions.contains_key(d))
            {
                return Err(DecompError::Schema(format!(
                    "record {} has dimensions {:?}, expected {:?}",
                    idx,
                    record.dimensions.keys().collect::<Vec<_>>(),
                    dimension_names
                )));
            }

            weeks.push(record.week);
            visits.push(to_i64(record.visits, VISITS_COLUMN, idx)?);
            conversions.push(to_i64(record.conversions, CONVERSIONS_COLUMN, idx)?);
            for (slot, name) in dimension_values.iter_mut().zip(&dimension_names) {
                slot.push(record.dimensions[name].clone());
            }
        }

        let mut columns = vec![Series::new(WEEK_COLUMN, weeks)];
        for (name, values) in dimension_names.iter().zip(dimension_values) {
            columns.push(Series::new(name.as_str(), values));
        }
        columns.push(Series::new(VISITS_COLUMN, visits));
        columns.push(Series::new(CONVERSIONS_COLUMN, conversions));

        Self::from_frame(DataFrame::new(columns)?)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Categorical columns, in table order.
    pub fn dimension_columns(&self) -> &[String] {
        &self.dimension_columns
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimension_columns.iter().any(|c| c == name)
    }

    /// Fail before any computation if a requested dimension is not a column.
    pub fn require_dimensions(&self, spec: &DimensionSpec) -> Result<()> {
        for name in spec.names() {
            if !self.has_dimension(name) {
                return Err(DecompError::MissingDimension(name.clone()));
            }
        }
        Ok(())
    }

    /// Distinct weeks, ascending.
    pub fn weeks(&self) -> Result<Vec<i64>> {
        let weeks: BTreeSet<i64> = self
            .frame
            .column(WEEK_COLUMN)?
            .i64()?
            .into_iter()
            .flatten()
            .collect();
        Ok(weeks.into_iter().collect())
    }

    /// Adjacent pairs over the sorted distinct weeks. Missing weeks are not
    /// filled in.
    pub fn week_pairs(&self) -> Result<Vec<WeekPair>> {
        let weeks = self.weeks()?;
        Ok(weeks
            .windows(2)
            .map(|w| WeekPair::new(w[0], w[1]))
            .collect())
    }

    /// Distinct values observed anywhere in the table for one dimension, sorted.
    pub fn distinct_values(&self, dimension: &str) -> Result<Vec<String>> {
        if !self.has_dimension(dimension) {
            return Err(DecompError::MissingDimension(dimension.to_string()));
        }
        let values: BTreeSet<String> = self
            .frame
            .column(dimension)?
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        Ok(values.into_iter().collect())
    }
}

fn to_i64(value: u64, column: &str, row: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        DecompError::Schema(format!("record {}: {} value {} overflows i64", row, column, value))
    })
}
