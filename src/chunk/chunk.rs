//! Placeholder chunk encoder.
//!
//! The wire byte layout and compression scheme are explicitly out of scope:
//! this encoder exists so the crate is runnable end to end, not as a
//! production encoding. Points are appended to a plain `Vec<Point>` and
//! serialized with `bincode` on demand.

use thiserror::Error;

use crate::types::point::Point;

/// A push was rejected by the encoder.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPushError {
    /// The chunk already received its end-of-stream marker.
    #[error("chunk is closed")]
    Closed,
    /// The pushed timestamp is older than the last point already in the chunk.
    #[error("timestamp is not monotonically non-decreasing within the chunk")]
    NotMonotonic,
}

/// One fixed-time-span chunk of points, owned by exactly one series.
///
/// Invariants upheld by this type: points are pushed in non-decreasing
/// timestamp order; once `closed`, no further pushes succeed. Bucket
/// membership (`T0 <= ts < T0 + ChunkSpan`) is the caller's responsibility —
/// the encoder only knows about monotonicity and closedness.
#[derive(Debug, Clone)]
pub struct Chunk {
    t0: u32,
    last_ts: u32,
    closed: bool,
    first: bool,
    points: Vec<Point>,
}

impl Chunk {
    /// Allocate a fresh, open chunk aligned at `t0`.
    pub fn new(t0: u32) -> Self {
        Self {
            t0,
            last_ts: 0,
            closed: false,
            first: false,
            points: Vec::new(),
        }
    }

    /// Allocate a fresh, open chunk aligned at `t0`, marked as the earliest
    /// chunk this series has ever held.
    pub fn new_first(t0: u32) -> Self {
        let mut chunk = Self::new(t0);
        chunk.first = true;
        chunk
    }

    /// Reuse this chunk's allocation for a new bucket, discarding its
    /// contents and clearing every flag.
    pub fn clear(&mut self, t0: u32) {
        self.points.clear();
        self.t0 = t0;
        self.last_ts = 0;
        self.closed = false;
        self.first = false;
    }

    /// Append a point. Rejects out-of-order pushes and pushes after `finish`.
    pub fn push(&mut self, ts: u32, val: f64) -> Result<(), ChunkPushError> {
        if self.closed {
            return Err(ChunkPushError::Closed);
        }
        if !self.points.is_empty() && ts < self.last_ts {
            return Err(ChunkPushError::NotMonotonic);
        }
        self.points.push(Point::new(ts, val));
        self.last_ts = ts;
        Ok(())
    }

    /// Append the end-of-stream marker and seal the chunk against further
    /// pushes.
    pub fn finish(&mut self) {
        self.closed = true;
    }

    /// Aligned start timestamp of this chunk's bucket.
    pub fn t0(&self) -> u32 {
        self.t0
    }

    /// Latest timestamp pushed into this chunk, or `0` if empty.
    pub fn last_ts(&self) -> u32 {
        self.last_ts
    }

    /// Whether `finish` has been called.
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Whether this is the earliest chunk this series has ever held.
    pub fn first(&self) -> bool {
        self.first
    }

    /// Number of points currently held.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether this chunk holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over decoded points in ingestion (timestamp) order.
    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().copied()
    }

    /// Encode the chunk's points to bytes.
    pub fn bytes(&self) -> crate::core::error::Result<Vec<u8>> {
        bincode::serialize(&self.points)
            .map_err(|e| crate::core::error::SerializationError::Bincode(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_after_finish() {
        let mut c = Chunk::new(600);
        c.push(600, 1.0).unwrap();
        c.finish();
        assert_eq!(c.push(601, 2.0), Err(ChunkPushError::Closed));
    }

    #[test]
    fn push_rejects_out_of_order() {
        let mut c = Chunk::new(600);
        c.push(650, 1.0).unwrap();
        assert_eq!(c.push(610, 2.0), Err(ChunkPushError::NotMonotonic));
    }

    #[test]
    fn push_allows_equal_timestamps() {
        let mut c = Chunk::new(600);
        c.push(650, 1.0).unwrap();
        assert!(c.push(650, 2.0).is_ok());
    }

    #[test]
    fn clear_resets_flags_and_contents() {
        let mut c = Chunk::new_first(600);
        c.push(650, 1.0).unwrap();
        c.finish();
        c.clear(1200);
        assert_eq!(c.t0(), 1200);
        assert!(!c.closed());
        assert!(!c.first());
        assert!(c.is_empty());
    }
}
