//! Core foundations: error handling, configuration, and metrics.

/// Error types and result handling
pub mod error;
/// Configuration data model (retention, aggregation, maintenance)
pub mod config;
/// Prometheus-backed metrics
pub mod metrics;

pub use error::{Error, Result};
pub use config::SeriesStoreConfig;
pub use metrics::Metrics;