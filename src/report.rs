//! Report output
//!
//! Downstream consumers of a finished [`DecompositionTable`]: delimited text,
//! JSON, and a plain-text contributor listing. Nothing here reaches back into
//! the engine.

use crate::core::decomposition::{
    ContributorRanker, DecompositionRow, DecompositionTable, Diagnostic, EffectKind, PairSummary,
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Persist the row contract (dimension columns, week pair, both effects).
pub fn write_csv(table: &DecompositionTable, path: impl AsRef<Path>) -> Result<()> {
    let mut frame = table.to_dataframe()?;
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut frame)?;
    info!("💾 Wrote {} rows to {}", frame.height(), path.as_ref().display());
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    dimensions: &'a [String],
    total_rate_effect: f64,
    total_proportion_effect: f64,
    pair_summaries: &'a [PairSummary],
    diagnostics: &'a [Diagnostic],
    rows: &'a [DecompositionRow],
}

pub fn write_json(table: &DecompositionTable, path: impl AsRef<Path>) -> Result<()> {
    let report = JsonReport {
        generated_at: Utc::now(),
        dimensions: table.dimensions(),
        total_rate_effect: table.total_rate_effect(),
        total_proportion_effect: table.total_proportion_effect(),
        pair_summaries: table.pair_summaries(),
        diagnostics: table.diagnostics(),
        rows: table.rows(),
    };
    let content = serde_json::to_string_pretty(&report)?;
    std::fs::write(path.as_ref(), content)?;
    info!("💾 Wrote JSON report to {}", path.as_ref().display());
    Ok(())
}

/// Top-k listing for each effect column.
pub fn render_top_contributors(ranker: &ContributorRanker<'_>, k: usize) -> String {
    let mut out = String::new();
    for kind in [EffectKind::Rate, EffectKind::Proportion] {
        out.push_str(&format!("Top {} by {}:\n", k, kind.column_name()));
        let rows = ranker.top_by(kind, k);
        if rows.is_empty() {
            out.push_str("  (no rows)\n");
        }
        for (rank, row) in rows.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {:<32} {:>4} -> {:<4} {:+.6}\n",
                rank + 1,
                ranker.label(row),
                row.pair.week_before,
                row.pair.week_after,
                kind.value(row)
            ));
        }
        out.push('\n');
    }
    out
}

pub fn render_pair_summaries(table: &DecompositionTable) -> String {
    let header = format!(
        "{:>6} {:>6} {:>10} {:>10} {:>10} {:>12} {:>12} {:>10}",
        "before", "after", "rate_b", "rate_a", "delta", "rate_eff", "prop_eff", "residual"
    );
    let lines = table.pair_summaries().iter().map(|s| {
        format!(
            "{:>6} {:>6} {:>10.6} {:>10.6} {:>+10.6} {:>+12.6} {:>+12.6} {:>10.2e}",
            s.pair.week_before,
            s.pair.week_after,
            s.rate_before,
            s.rate_after,
            s.rate_change,
            s.rate_effect_sum,
            s.proportion_effect_sum,
            s.residual
        )
    });
    std::iter::once(header).chain(lines).join("\n")
}
