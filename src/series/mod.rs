//! The series state machine, rollup fan-out, the outer series index, and
//! the `Get` result type.

/// The series state machine: Add, Get, persist, Sync, GC.
pub mod series_store;
/// Rollup fan-out accumulation and dispatch.
pub mod aggregator;
/// Concurrent key -> `SeriesStore` index and GC sweep.
pub mod index;
/// `Get` result type.
pub mod result;

pub use aggregator::Aggregator;
pub use index::{MaintenanceHandle, SeriesIndex};
pub use result::GetResult;
pub use series_store::SeriesStore;
