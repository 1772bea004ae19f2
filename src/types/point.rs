//! The fundamental sample type the storage core ingests and serves.

use serde::{Deserialize, Serialize};

/// A single timestamped sample.
///
/// `ts` is Unix seconds. `ts == 0` is reserved to mean "uninitialized" and
/// must never be stored — callers constructing a `Point` from untrusted
/// input should treat a zero timestamp as invalid before it reaches the
/// storage core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix timestamp in seconds.
    pub ts: u32,
    /// Sample value.
    pub val: f64,
}

impl Point {
    /// Construct a point.
    pub fn new(ts: u32, val: f64) -> Self {
        Self { ts, val }
    }

    /// Whether this point carries the reserved "uninitialized" timestamp.
    pub fn is_uninitialized(&self) -> bool {
        self.ts == 0
    }
}
