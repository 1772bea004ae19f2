//! Error types and handling for the time-series storage core
//!
//! This module defines all error types used throughout the crate. Data-quality
//! issues that are expected in normal operation (a too-old point, a write
//! against a closed chunk) are never modeled as `Error` — they are absorbed
//! and counted by the metrics layer instead. See [`SeriesError`] for the
//! query/configuration-facing failures that do propagate.

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the storage core
#[derive(Error, Debug)]
pub enum Error {
    /// Series-level query or configuration errors
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Errors surfaced by `SeriesStore` queries and aggregator wiring
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    /// `Get(from, to)` called with `from >= to`
    #[error("invalid range: from ({from}) >= to ({to})")]
    InvalidRange {
        /// Requested range start (inclusive)
        from: u32,
        /// Requested range end (exclusive)
        to: u32,
    },

    /// A ring slot was unexpectedly empty during traversal
    #[error("internal invariant violation: nil chunk at ring position {pos}")]
    NilChunk {
        /// Ring position that was empty
        pos: usize,
    },

    /// `GetAggregated` referenced a consolidator with no matching child series
    #[error("consolidator {0:?} is not configured for this series")]
    ConsolidatorNotConfigured(crate::types::consolidation::Consolidator),

    /// `SyncAggregatedChunkSaveState`/`GetAggregated` referenced a consolidator
    /// that cannot name a rollup child (`None` or `Avg` are not themselves
    /// rollup children; `Avg` is derived from `sum`/`cnt`)
    #[error("{0:?} does not name an aggregator child")]
    UnknownConsolidator(crate::types::consolidation::Consolidator),

    /// `GetAggregated` referenced a rollup span with no configured aggregator
    #[error("no aggregator configured for span {0}")]
    UnknownAggSpan(u32),
}

/// Serialization/deserialization errors
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Bincode serialization error
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this is a client/caller error (bad range, unknown consolidator, ...)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Series(_) | Error::Config(_))
    }
}
