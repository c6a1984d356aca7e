//! Contributor Ranker
//!
//! Picks the strongest rows per effect column for reporting.

use super::table::{DecompositionRow, DecompositionTable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_LABEL_SEPARATOR: &str = " / ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Rate,
    Proportion,
}

impl EffectKind {
    pub fn value(&self, row: &DecompositionRow) -> f64 {
        match self {
            EffectKind::Rate => row.rate_effect,
            EffectKind::Proportion => row.proportion_effect,
        }
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            EffectKind::Rate => super::table::RATE_EFFECT_COLUMN,
            EffectKind::Proportion => super::table::PROPORTION_EFFECT_COLUMN,
        }
    }
}

pub struct ContributorRanker<'a> {
    table: &'a DecompositionTable,
    separator: String,
}

impl<'a> ContributorRanker<'a> {
    pub fn new(table: &'a DecompositionTable) -> Self {
        Self::with_separator(table, DEFAULT_LABEL_SEPARATOR)
    }

    pub fn with_separator(table: &'a DecompositionTable, separator: &str) -> Self {
        Self {
            table,
            separator: separator.to_string(),
        }
    }

    pub fn table(&self) -> &'a DecompositionTable {
        self.table
    }

    pub fn top_by_rate_effect(&self, k: usize) -> Vec<&'a DecompositionRow> {
        self.top_by(EffectKind::Rate, k)
    }

    pub fn top_by_proportion_effect(&self, k: usize) -> Vec<&'a DecompositionRow> {
        self.top_by(EffectKind::Proportion, k)
    }

    /// Descending by effect; ties broken by segment values, then week pair.
    pub fn top_by(&self, kind: EffectKind, k: usize) -> Vec<&'a DecompositionRow> {
        let mut rows: Vec<&DecompositionRow> = self.table.rows().iter().collect();
        rows.sort_by(|a, b| compare_rows(kind, a, b));
        rows.truncate(k);
        rows
    }

    /// Joined dimension values, for display only.
    pub fn label(&self, row: &DecompositionRow) -> String {
        row.segment.label(&self.separator)
    }
}

fn compare_rows(kind: EffectKind, a: &DecompositionRow, b: &DecompositionRow) -> Ordering {
    kind.value(b)
        .total_cmp(&kind.value(a))
        .then_with(|| a.segment.cmp(&b.segment))
        .then_with(|| a.pair.cmp(&b.pair))
}
