//! Rollup consolidator kinds.

use serde::{Deserialize, Serialize};

/// How a rollup archive was derived from its native-resolution parent.
///
/// `None` names the raw series itself, not a rollup. `Avg` is never stored
/// as its own archive: it is derived at query time from the `sum` and `cnt`
/// archives of the same span, matching how averages are reconstructed from
/// paired sum/count rollups rather than carried directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consolidator {
    /// The raw, native-resolution series.
    None,
    /// Average — derived from `Sum`/`Cnt` at query time.
    Avg,
    /// Count of points consolidated into each coarser-resolution point.
    Cnt,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Sum of values.
    Sum,
    /// Last value observed in the consolidation window.
    Lst,
}

impl Consolidator {
    /// Whether this consolidator names an actual aggregator child series
    /// (as opposed to the raw series, or a value derived at query time).
    pub fn is_aggregator_child(&self) -> bool {
        !matches!(self, Consolidator::None | Consolidator::Avg)
    }
}
