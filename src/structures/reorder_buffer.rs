//! Bounded out-of-order window for late-arriving points.

use std::collections::VecDeque;

use crate::types::point::Point;

/// Outcome of submitting a point to a [`ReorderBuffer`].
pub struct SubmitOutcome {
    /// Points pushed out of the window by this submission, oldest first.
    /// Empty unless the buffer was at capacity.
    pub evicted: Vec<Point>,
    /// Whether the submitted point was accepted into the window. If
    /// `false`, `evicted` is always empty and the point was dropped.
    pub accepted: bool,
}

/// Fixed-capacity, timestamp-ordered window absorbing late-arriving points
/// before they reach the chunk ring.
///
/// A point is accepted iff its timestamp is within `window` points (at
/// `seconds_per_point` native resolution) of the newest timestamp already
/// buffered; an empty buffer accepts unconditionally. Acceptance keeps the
/// buffer sorted by timestamp; once the buffer exceeds `window` points, the
/// oldest are evicted and handed back to the caller for insertion into
/// chunks.
pub struct ReorderBuffer {
    window: usize,
    seconds_per_point: u32,
    points: VecDeque<Point>,
}

impl ReorderBuffer {
    /// Build a reorder buffer with the given window depth (in points) and
    /// native resolution (seconds per point).
    pub fn new(window: usize, seconds_per_point: u32) -> Self {
        assert!(window > 0, "reorder window must be positive when enabled");
        Self {
            window,
            seconds_per_point,
            points: VecDeque::with_capacity(window),
        }
    }

    /// Submit a point. See type docs for acceptance rule.
    pub fn submit(&mut self, ts: u32, val: f64) -> SubmitOutcome {
        let newest = self.points.back().map(|p| p.ts);
        if let Some(newest_ts) = newest {
            let cutoff = newest_ts.saturating_sub(self.window as u32 * self.seconds_per_point);
            if ts <= cutoff {
                return SubmitOutcome {
                    evicted: Vec::new(),
                    accepted: false,
                };
            }
        }

        let pos = self.points.partition_point(|p| p.ts <= ts);
        self.points.insert(pos, Point::new(ts, val));

        let mut evicted = Vec::new();
        while self.points.len() > self.window {
            if let Some(p) = self.points.pop_front() {
                evicted.push(p);
            }
        }

        SubmitOutcome {
            evicted,
            accepted: true,
        }
    }

    /// Snapshot the buffer's current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }

    /// Drain every buffered point, oldest first, leaving the buffer empty.
    /// Used by GC to flush a series before deciding collectability.
    pub fn drain_all(&mut self) -> Vec<Point> {
        self.points.drain(..).collect()
    }

    /// Whether the buffer currently holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_accepts_unconditionally() {
        let mut rob = ReorderBuffer::new(3, 10);
        let outcome = rob.submit(1000, 1.0);
        assert!(outcome.accepted);
        assert!(outcome.evicted.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut rob = ReorderBuffer::new(2, 10);
        rob.submit(1000, 1.0);
        rob.submit(1010, 2.0);
        let outcome = rob.submit(1020, 3.0);
        assert!(outcome.accepted);
        assert_eq!(outcome.evicted.len(), 1);
        assert_eq!(outcome.evicted[0].ts, 1000);
        assert_eq!(rob.snapshot().len(), 2);
    }

    #[test]
    fn too_old_point_is_rejected() {
        let mut rob = ReorderBuffer::new(2, 10);
        rob.submit(1000, 1.0);
        rob.submit(1010, 2.0);
        // window = 2 points * 10s = 20s; cutoff = 1010 - 20 = 990
        let outcome = rob.submit(990, 9.0);
        assert!(!outcome.accepted);
        assert!(outcome.evicted.is_empty());
    }

    #[test]
    fn late_but_in_window_point_is_reordered() {
        let mut rob = ReorderBuffer::new(3, 10);
        rob.submit(1000, 1.0);
        rob.submit(1020, 2.0);
        let outcome = rob.submit(1010, 1.5);
        assert!(outcome.accepted);
        let snap = rob.snapshot();
        assert_eq!(snap.iter().map(|p| p.ts).collect::<Vec<_>>(), vec![1000, 1010, 1020]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whatever order points are submitted in, an accepted submission
        /// always leaves the buffer sorted by timestamp and never over the
        /// configured window depth.
        #[test]
        fn buffer_stays_sorted_and_bounded(
            window in 1usize..16,
            submissions in prop::collection::vec(0u32..500, 0..200),
        ) {
            let mut rob = ReorderBuffer::new(window, 1);
            for ts in submissions {
                rob.submit(ts, 0.0);
                let snap = rob.snapshot();
                prop_assert!(snap.len() <= window);
                for pair in snap.windows(2) {
                    prop_assert!(pair[0].ts <= pair[1].ts);
                }
            }
        }
    }
}
