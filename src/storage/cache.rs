//! Hot-read cache hookup.
//!
//! `add_if_hot` must never block the caller: a rollover holds the series
//! lock, and a cache push that blocked would stall every reader and writer
//! of that series. The point generator is passed lazily so an implementation
//! that decides the key isn't hot never pays the cost of decoding it.

use crate::types::key::ArchiveTag;
use crate::types::point::Point;
use crate::types::SeriesKey;

/// A lazily-evaluated source of a sealed chunk's decoded points, handed to
/// `CachePusher::add_if_hot` so cold keys never pay a decode cost.
pub type PointSource = Box<dyn FnOnce() -> Vec<Point> + Send>;

/// Opportunistic hot-read cache, fed on every chunk rollover.
pub trait CachePusher: Send + Sync {
    /// Offer a just-sealed chunk's points to the cache. Implementations
    /// must return promptly; if the key isn't currently hot, drop silently.
    fn add_if_hot(&self, key: &SeriesKey, archive: Option<ArchiveTag>, points: PointSource);
}

/// Drops every offer. The default when no cache is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCachePusher;

impl CachePusher for NullCachePusher {
    fn add_if_hot(&self, _key: &SeriesKey, _archive: Option<ArchiveTag>, _points: PointSource) {}
}

/// Logs every offer at `trace` level instead of acting on it. Useful in
/// tests asserting that rollover doesn't block on cache interaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCachePusher;

impl CachePusher for LoggingCachePusher {
    fn add_if_hot(&self, key: &SeriesKey, archive: Option<ArchiveTag>, points: PointSource) {
        let points = points();
        tracing::trace!(
            key = %key,
            archive = ?archive,
            count = points.len(),
            "cache offer"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pusher_never_evaluates_generator() {
        let pusher = NullCachePusher;
        let key = SeriesKey::raw("metric.a");
        pusher.add_if_hot(
            &key,
            None,
            Box::new(|| panic!("generator should not be called")),
        );
    }
}
