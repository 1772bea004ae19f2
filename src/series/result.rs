//! The return type of `SeriesStore::get`.
//!
//! Named `GetResult` rather than `Result` to avoid colliding with this
//! crate's own `Result<T, Error>` alias.

use crate::types::point::Point;

/// Sentinel used to initialize `oldest` before a bound is known. Callers
/// should treat any value this large as "the chunk ring and ROB report no
/// trustworthy lower bound" rather than a literal timestamp.
pub const OLDEST_UNKNOWN: u32 = u32::MAX;

/// Result of a `Get(from, to)` range query.
///
/// `points` holds the reorder-buffer snapshot (if any); `chunk_points` holds
/// one decoded point sequence per selected chunk, oldest to newest. A true
/// lazy iterator per chunk can't outlive the read lock it was produced
/// under, so chunks selected by a query are decoded eagerly while the lock
/// is held and handed back as owned sequences.
#[derive(Debug, Clone, Default)]
pub struct GetResult {
    /// Points currently sitting in the reorder buffer, if one is configured.
    pub points: Vec<Point>,
    /// One entry per selected chunk, oldest to newest.
    pub chunk_points: Vec<Vec<Point>>,
    /// The oldest timestamp this result can vouch for. The caller needs no
    /// backing-store lookup for `[from, oldest)` once `oldest <= from`.
    pub oldest: u32,
}

impl GetResult {
    /// A result reporting no data and no trustworthy bound.
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            chunk_points: Vec::new(),
            oldest: OLDEST_UNKNOWN,
        }
    }

    /// Iterate every point across the ROB snapshot and selected chunks, in
    /// chronological order (ROB points are reported separately from chunk
    /// points per the query algorithm, but are always older than the
    /// current chunk's contents is not guaranteed in general — callers that
    /// want a single merged stream should sort; most callers inspect the
    /// two parts separately instead).
    pub fn chunk_points_iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.chunk_points.iter().flatten().copied()
    }
}
