//! Metrics collection for the time-series storage core
//!
//! Counters and histograms for every event spec'd as countable: dropped
//! too-old points, writes against closed chunks, chunk create/clear,
//! unknown consolidator/span lookups, and persist/get latency. Registered
//! against a crate-local [`prometheus::Registry`] rather than the global
//! default registry, so more than one [`crate::series::index::SeriesIndex`]
//! can coexist in a single process (tests routinely build several).

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

use crate::core::error::Result;

/// Counters and histograms for one storage core instance.
pub struct Metrics {
    /// Chunks allocated (first-ever and rollover)
    pub chunk_create: IntCounter,
    /// Chunks cleared and reused (ring already at full length)
    pub chunk_clear: IntCounter,
    /// Points dropped for arriving before the current chunk's bucket
    pub metrics_too_old: IntCounter,
    /// Points dropped for arriving after the current chunk was closed
    pub add_to_closed_chunk: IntCounter,
    /// `GetAggregated` calls naming an unconfigured/non-child consolidator
    pub bad_consolidator: IntCounter,
    /// `GetAggregated` calls naming an unconfigured rollup span
    pub bad_agg_span: IntCounter,
    /// Ring positions found empty during `Get` traversal — an internal
    /// invariant violation, never expected in correct operation
    pub nil_chunk: IntCounter,
    /// Wall-clock latency of `persist` calls (includes time blocked on a
    /// full write queue — that blocking *is* the measured backpressure)
    pub persist_duration: Histogram,
    /// Wall-clock latency of `Get` calls
    pub get_duration: Histogram,

    registry: Registry,
}

impl Metrics {
    /// Build a fresh, independently-registered metrics set.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let chunk_create = IntCounter::with_opts(Opts::new(
            "tsbuf_chunk_create_total",
            "Chunks allocated (first-ever chunk or rollover)",
        ))?;
        let chunk_clear = IntCounter::with_opts(Opts::new(
            "tsbuf_chunk_clear_total",
            "Chunks cleared and reused at a ring position",
        ))?;
        let metrics_too_old = IntCounter::with_opts(Opts::new(
            "tsbuf_metrics_too_old_total",
            "Points dropped for arriving before the current chunk's bucket",
        ))?;
        let add_to_closed_chunk = IntCounter::with_opts(Opts::new(
            "tsbuf_add_to_closed_chunk_total",
            "Points dropped for arriving after the current chunk was closed",
        ))?;
        let bad_consolidator = IntCounter::with_opts(Opts::new(
            "tsbuf_bad_consolidator_total",
            "GetAggregated calls naming an unconfigured or non-child consolidator",
        ))?;
        let bad_agg_span = IntCounter::with_opts(Opts::new(
            "tsbuf_bad_agg_span_total",
            "GetAggregated calls naming an unconfigured rollup span",
        ))?;
        let nil_chunk = IntCounter::with_opts(Opts::new(
            "tsbuf_nil_chunk_total",
            "Ring positions found empty during Get traversal (invariant violation)",
        ))?;
        let persist_duration = Histogram::with_opts(HistogramOpts::new(
            "tsbuf_persist_duration_seconds",
            "Latency of persist(), including time blocked on a full write queue",
        ))?;
        let get_duration = Histogram::with_opts(HistogramOpts::new(
            "tsbuf_get_duration_seconds",
            "Latency of Get() range queries",
        ))?;

        registry.register(Box::new(chunk_create.clone()))?;
        registry.register(Box::new(chunk_clear.clone()))?;
        registry.register(Box::new(metrics_too_old.clone()))?;
        registry.register(Box::new(add_to_closed_chunk.clone()))?;
        registry.register(Box::new(bad_consolidator.clone()))?;
        registry.register(Box::new(bad_agg_span.clone()))?;
        registry.register(Box::new(nil_chunk.clone()))?;
        registry.register(Box::new(persist_duration.clone()))?;
        registry.register(Box::new(get_duration.clone()))?;

        Ok(Self {
            chunk_create,
            chunk_clear,
            metrics_too_old,
            add_to_closed_chunk,
            bad_consolidator,
            bad_agg_span,
            nil_chunk,
            persist_duration,
            get_duration,
            registry,
        })
    }

    /// The registry backing this metrics set, for a caller that wants to
    /// expose it on its own `/metrics` endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the current values in Prometheus text exposition format.
    pub fn collect(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        encoder.encode_to_string(&families).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to construct default metrics registry")
    }
}
