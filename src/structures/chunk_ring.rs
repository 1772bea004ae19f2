//! Bounded circular buffer of chunks.

use crate::chunk::Chunk;

/// What kind of slot a rollover produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverKind {
    /// The ring was not yet at full length; a brand new chunk was appended.
    Appended,
    /// The ring was already at full length; the oldest chunk's storage was
    /// cleared and reused for the new bucket.
    Reused,
}

/// `Chunks[0..len]` with `len <= capacity`. The newest chunk lives at
/// `current_pos`; walking backwards with wrap yields progressively older
/// chunks. Ring invariants (T0 monotonicity, at most one open chunk) are
/// upheld by the caller (`SeriesStore`) — this type only manages storage
/// and position bookkeeping.
pub struct ChunkRing {
    chunks: Vec<Chunk>,
    capacity: usize,
    current_pos: usize,
}

impl ChunkRing {
    /// Build an empty ring with the given capacity (`NumChunks`).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "NumChunks must be positive");
        Self {
            chunks: Vec::with_capacity(capacity),
            capacity,
            current_pos: 0,
        }
    }

    /// Number of live chunks currently held.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the ring holds no chunks yet.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether the ring is at full length (`len == capacity`).
    pub fn is_full(&self) -> bool {
        self.chunks.len() == self.capacity
    }

    /// Ring capacity (`NumChunks`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Position of the newest (current) chunk.
    pub fn current_pos(&self) -> usize {
        self.current_pos
    }

    /// Position of the oldest live chunk, or `None` if the ring is empty.
    pub fn oldest_pos(&self) -> Option<usize> {
        if self.chunks.is_empty() {
            None
        } else if self.is_full() {
            Some(self.next_pos(self.current_pos))
        } else {
            Some(0)
        }
    }

    /// The next position with wrap, relative to the ring's current length.
    pub fn next_pos(&self, pos: usize) -> usize {
        (pos + 1) % self.chunks.len()
    }

    /// The previous position with wrap, relative to the ring's current length.
    pub fn prev_pos(&self, pos: usize) -> usize {
        (pos + self.chunks.len() - 1) % self.chunks.len()
    }

    /// Shared reference to the chunk at `pos`.
    pub fn get(&self, pos: usize) -> Option<&Chunk> {
        self.chunks.get(pos)
    }

    /// Exclusive reference to the chunk at `pos`.
    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Chunk> {
        self.chunks.get_mut(pos)
    }

    /// Shared reference to the current (newest) chunk.
    pub fn current(&self) -> Option<&Chunk> {
        self.chunks.get(self.current_pos)
    }

    /// Exclusive reference to the current (newest) chunk.
    pub fn current_mut(&mut self) -> Option<&mut Chunk> {
        self.chunks.get_mut(self.current_pos)
    }

    /// Allocate the very first chunk this ring has ever held.
    ///
    /// Panics if the ring is not empty — callers must only invoke this once,
    /// on first ingestion.
    pub fn push_first(&mut self, t0: u32) {
        assert!(self.chunks.is_empty(), "push_first called on a non-empty ring");
        self.chunks.push(Chunk::new_first(t0));
        self.current_pos = 0;
    }

    /// Roll over to a fresh bucket at `t0`: append if the ring has spare
    /// capacity, otherwise advance and reuse the oldest slot's storage.
    pub fn rollover(&mut self, t0: u32) -> RolloverKind {
        if !self.is_full() {
            self.chunks.push(Chunk::new(t0));
            self.current_pos = self.chunks.len() - 1;
            RolloverKind::Appended
        } else {
            self.current_pos = (self.current_pos + 1) % self.capacity;
            self.chunks[self.current_pos].clear(t0);
            RolloverKind::Reused
        }
    }

    /// Positions from `start` to `end` inclusive, walking forward with wrap.
    /// Both must be valid positions in a non-empty ring.
    pub fn positions_from(&self, start: usize, end: usize) -> Vec<usize> {
        if self.chunks.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut p = start;
        loop {
            out.push(p);
            if p == end {
                break;
            }
            p = self.next_pos(p);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_until_full_then_reuses() {
        let mut ring = ChunkRing::new(3);
        ring.push_first(600);
        assert_eq!(ring.len(), 1);

        assert_eq!(ring.rollover(1200), RolloverKind::Appended);
        assert_eq!(ring.rollover(1800), RolloverKind::Appended);
        assert_eq!(ring.len(), 3);
        assert!(ring.is_full());

        assert_eq!(ring.rollover(2400), RolloverKind::Reused);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.current().unwrap().t0(), 2400);
        // oldest chunk (T0=600) was evicted; oldest live is now T0=1200
        let oldest = ring.oldest_pos().unwrap();
        assert_eq!(ring.get(oldest).unwrap().t0(), 1200);
    }

    #[test]
    fn positions_from_wraps_correctly() {
        let mut ring = ChunkRing::new(3);
        ring.push_first(600);
        ring.rollover(1200);
        ring.rollover(1800);
        ring.rollover(2400); // wraps: slot 0 (T0=600) reused as T0=2400

        let oldest = ring.oldest_pos().unwrap();
        let newest = ring.current_pos();
        let positions = ring.positions_from(oldest, newest);
        let t0s: Vec<u32> = positions
            .iter()
            .map(|&p| ring.get(p).unwrap().t0())
            .collect();
        assert_eq!(t0s, vec![1200, 1800, 2400]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Regardless of how many rollovers happen, the ring never holds more
        /// than `capacity` chunks and walking `oldest..current` forward always
        /// yields T0s in strictly increasing order.
        #[test]
        fn ring_stays_bounded_and_monotonic(
            capacity in 1usize..8,
            t0s in prop::collection::vec(1u32..100, 1..64),
        ) {
            let mut ring = ChunkRing::new(capacity);
            let span = 600u32;
            let mut first = true;
            for offset in t0s {
                let t0 = offset * span;
                if first {
                    ring.push_first(t0);
                    first = false;
                } else if let Some(cur) = ring.current().map(|c| c.t0()) {
                    if t0 > cur {
                        ring.rollover(t0);
                    }
                    // t0 <= cur: same bucket or an out-of-order arrival, dropped.
                }
            }

            prop_assert!(ring.len() <= capacity);

            if let Some(oldest) = ring.oldest_pos() {
                let positions = ring.positions_from(oldest, ring.current_pos());
                let t0s: Vec<u32> = positions.iter().map(|&p| ring.get(p).unwrap().t0()).collect();
                for window in t0s.windows(2) {
                    prop_assert!(window[0] < window[1]);
                }
            }
        }
    }
}
