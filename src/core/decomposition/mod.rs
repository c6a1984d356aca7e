//! Metric-change decomposition
//!
//! Enumerator -> Aggregator -> Decomposer -> Result Table -> Ranker.

pub mod aggregator;
pub mod decomposer;
pub mod diagnostics;
pub mod enumerator;
pub mod ranker;
pub mod table;

pub use aggregator::{SegmentAggregator, SegmentTotals, SegmentWeekAggregate, WeekSlice};
pub use decomposer::{CancelFlag, DecomposeOptions, Decomposer};
pub use diagnostics::Diagnostic;
pub use enumerator::{DimensionEnumerator, SegmentKey};
pub use ranker::{ContributorRanker, EffectKind, DEFAULT_LABEL_SEPARATOR, DEFAULT_TOP_K};
pub use table::{DecompositionRow, DecompositionTable, PairSummary};
