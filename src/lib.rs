pub mod config;
pub mod core;
pub mod dataset;
pub mod error;
pub mod ingestion;
pub mod report;
pub mod weekly;

pub use crate::config::DecompositionConfig;
pub use crate::core::decomposition::{
    CancelFlag, ContributorRanker, DecomposeOptions, Decomposer, DecompositionRow,
    DecompositionTable, Diagnostic, DimensionEnumerator, EffectKind, PairSummary, SegmentAggregator,
    SegmentKey,
};
pub use crate::dataset::{Dataset, DimensionSpec, MetricRecord, WeekPair};
pub use crate::error::{DecompError, Result};
pub use crate::weekly::WeeklyAggregates;
