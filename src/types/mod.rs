//! Core data types: samples, series keys, and consolidator kinds.

/// Timestamped samples.
pub mod point;
/// Series identifiers.
pub mod key;
/// Rollup consolidator kinds.
pub mod consolidation;

pub use consolidation::Consolidator;
pub use key::{ArchiveTag, SeriesKey};
pub use point::Point;
