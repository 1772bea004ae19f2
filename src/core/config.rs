//! Configuration data model for the time-series storage core
//!
//! These structs describe *how a series is shaped* (chunk span, ring depth,
//! reorder window, retention, rollup definitions) — they are pure data. There
//! is deliberately no file/env loader here: wiring configuration into a
//! running process is an application concern, out of scope for this crate.

use serde::{Deserialize, Serialize};

use crate::types::consolidation::Consolidator;

/// Per-archive retention and ring-sizing policy.
///
/// One `Retention` describes either the raw (native-resolution) series or
/// one rollup archive fed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Duration in seconds each chunk covers (`ChunkSpan`). Must be > 0.
    pub chunk_span: u32,
    /// Capacity of the circular chunk ring (`NumChunks`). Must be > 0.
    pub num_chunks: usize,
    /// Time-to-live in seconds used by the GC staleness check. `0` disables
    /// TTL-based eviction (idle detection via `lastWrite` still applies).
    pub ttl: u32,
}

impl Retention {
    /// Construct a retention policy, rejecting degenerate spans/depths.
    pub fn new(chunk_span: u32, num_chunks: usize, ttl: u32) -> Self {
        assert!(chunk_span > 0, "chunk_span must be positive");
        assert!(num_chunks > 0, "num_chunks must be positive");
        Self {
            chunk_span,
            num_chunks,
            ttl,
        }
    }
}

/// One configured rollup: which span it aggregates to and which consolidator
/// families to instantiate as aggregator children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupDefinition {
    /// Coarser resolution this rollup aggregates into, in seconds.
    pub agg_span: u32,
    /// Retention policy for the rollup archive itself.
    pub retention: Retention,
    /// Which consolidator children to build for this span. `None`/`Avg`
    /// never appear here: `Avg` is derived at query time from `sum`/`cnt`,
    /// and `None` names the raw series, not a rollup.
    pub consolidators: Vec<Consolidator>,
}

/// Aggregation configuration: the full set of rollups fed synchronously from
/// a raw series, mirroring `conf.Aggregation` in the system this crate
/// reimplements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Rollups to build, in ascending `agg_span` order by convention (not
    /// enforced — lookups are by span, not position).
    pub rollups: Vec<RollupDefinition>,
}

impl AggregationConfig {
    /// Find the rollup definition for a given span, if configured.
    pub fn rollup_for_span(&self, agg_span: u32) -> Option<&RollupDefinition> {
        self.rollups.iter().find(|r| r.agg_span == agg_span)
    }
}

/// Full configuration for one `SeriesStore` instance (raw series; its
/// aggregator children are configured by `aggregation`, not by a nested
/// `SeriesStoreConfig` of their own — a rollup's own ring depth/ttl come
/// from its `RollupDefinition::retention`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesStoreConfig {
    /// Retention policy for the raw (native-resolution) series.
    pub retention: Retention,
    /// Reorder window depth in points. `0` disables the reorder buffer.
    pub reorder_window: usize,
    /// If true, the first chunk ever opened for a series is never persisted
    /// (it may be partial — the series could have existed before this
    /// process started observing it).
    pub drop_first_chunk: bool,
    /// Rollups fed synchronously from this series.
    pub aggregation: AggregationConfig,
}

impl Default for SeriesStoreConfig {
    fn default() -> Self {
        Self {
            retention: Retention::new(600, 5, 0),
            reorder_window: 0,
            drop_first_chunk: false,
            aggregation: AggregationConfig::default(),
        }
    }
}

impl SeriesStoreConfig {
    /// Validate internal consistency beyond what the type system captures.
    pub fn validate(&self) -> crate::core::error::Result<()> {
        if self.retention.chunk_span == 0 {
            return Err(crate::core::error::Error::config("chunk_span must be positive"));
        }
        if self.retention.num_chunks == 0 {
            return Err(crate::core::error::Error::config("num_chunks must be positive"));
        }
        for rollup in &self.aggregation.rollups {
            if rollup.retention.chunk_span == 0 || rollup.retention.num_chunks == 0 {
                return Err(crate::core::error::Error::config(format!(
                    "rollup at span {} has degenerate retention",
                    rollup.agg_span
                )));
            }
            for c in &rollup.consolidators {
                if matches!(c, Consolidator::None | Consolidator::Avg) {
                    return Err(crate::core::error::Error::config(format!(
                        "{:?} cannot be configured as an aggregator child",
                        c
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Maintenance (GC sweep) configuration, shared by every series in a
/// [`crate::series::index::SeriesIndex`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Interval in seconds between GC sweeps of the whole index.
    pub sweep_interval_secs: u64,
    /// Grace period in seconds added to a still-open chunk's span before it
    /// is considered collectable ("a realtime stream could still backfill
    /// this chunk").
    pub gc_grace_secs: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            gc_grace_secs: 15 * 60,
        }
    }
}

/// Number of maintenance/worker threads to use when the caller asks for
/// auto-detection (`requested == 0`): one per available core.
pub fn optimal_worker_threads(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}
