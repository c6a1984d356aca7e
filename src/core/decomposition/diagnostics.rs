//! Data-quality findings collected while decomposing. None of them abort
//! the batch.

use super::enumerator::SegmentKey;
use crate::dataset::WeekPair;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The week's total visits is zero, so every proportion in it is 0.
    ZeroWeekTraffic { week: i64 },

    /// A segment failed validation for one week pair and produced no row.
    SegmentSkipped {
        segment: SegmentKey,
        pair: WeekPair,
        reason: String,
    },
}

impl Diagnostic {
    pub fn is_segment_skip(&self) -> bool {
        matches!(self, Diagnostic::SegmentSkipped { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ZeroWeekTraffic { week } => {
                write!(f, "week {} has zero total visits; proportions degrade to 0", week)
            }
            Diagnostic::SegmentSkipped {
                segment,
                pair,
                reason,
            } => write!(f, "segment [{}] skipped for weeks {}: {}", segment, pair, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_skipped_serializes_week_pair() {
        let diagnostic = Diagnostic::SegmentSkipped {
            segment: SegmentKey::new(vec![("country".to_string(), "US".to_string())]),
            pair: WeekPair::new(3, 4),
            reason: "negative visits".to_string(),
        };
        let json = serde_json::to_value(&diagnostic).unwrap();

        assert_eq!(json["kind"], "segment_skipped");
        assert_eq!(json["pair"]["week_before"], 3);
        assert_eq!(json["pair"]["week_after"], 4);
        assert_eq!(json["reason"], "negative visits");
        assert!(diagnostic.is_segment_skip());
        assert_eq!(
            diagnostic.to_string(),
            "segment [country=US] skipped for weeks 3->4: negative visits"
        );
    }
}
