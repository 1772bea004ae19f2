//! An in-memory time-series storage core.
//!
//! Accepts a stream of timestamped samples for a series key, buffers recent
//! samples in an optional reorder window, packs them into fixed-span
//! chunks held in a bounded circular ring, synchronously fans out to
//! pre-configured rollup aggregators, hands sealed chunks to a persistence
//! pipeline and a hot-read cache, answers range queries that blend buffered
//! and chunked data, and garbage-collects idle series.
//!
//! The on-disk chunk byte layout, metric-definition/tag-query filtering, and
//! any RPC/CLI/network-ingestion surface are out of scope: [`chunk::Chunk`]
//! ships a placeholder encoding, and [`storage`] exposes traits a caller
//! wires up to its own persistent store, cache, and cluster coordinator.
#![warn(missing_docs)]

// Configure global allocator for maximum performance
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

// Core foundational modules
pub mod core;

// Data types and algorithmic components
pub mod types;
pub mod chunk;
pub mod structures;
pub mod storage;
pub mod series;

pub use core::{Error, Result};
pub use series::{SeriesIndex, SeriesStore};
pub use types::{Consolidator, Point, SeriesKey};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing and the metrics registry. Optional — callers embedding
/// this crate in a larger process may already have their own `tracing`
/// subscriber installed, in which case this should be skipped.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("initializing {} v{}", NAME, VERSION);
    Ok(())
}