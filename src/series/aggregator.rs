//! Rollup fan-out: per-span accumulation and dispatch to consolidator children.

use std::sync::Arc;

use crate::core::config::{RollupDefinition, SeriesStoreConfig};
use crate::core::metrics::Metrics;
use crate::storage::cache::CachePusher;
use crate::storage::cluster::ClusterRole;
use crate::storage::store::Store;
use crate::types::consolidation::Consolidator;
use crate::types::key::SeriesKey;

use super::series_store::SeriesStore;

/// One finalized consolidation window, ready to fan out to every configured
/// consolidator child for this span.
struct FinalizedWindow {
    t0: u32,
    cnt: u64,
    min: f64,
    max: f64,
    sum: f64,
    lst: f64,
}

impl FinalizedWindow {
    fn value_for(&self, consolidator: Consolidator) -> f64 {
        match consolidator {
            Consolidator::Cnt => self.cnt as f64,
            Consolidator::Min => self.min,
            Consolidator::Max => self.max,
            Consolidator::Sum => self.sum,
            Consolidator::Lst => self.lst,
            Consolidator::None | Consolidator::Avg => {
                unreachable!("None/Avg are rejected at aggregator-child configuration time")
            }
        }
    }
}

/// Running accumulator for the consolidation window currently in progress.
struct AggregationBucket {
    span: u32,
    t0: Option<u32>,
    cnt: u64,
    min: f64,
    max: f64,
    sum: f64,
    lst: f64,
}

impl AggregationBucket {
    fn new(span: u32) -> Self {
        Self {
            span,
            t0: None,
            cnt: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            lst: 0.0,
        }
    }

    fn reset(&mut self, t0: u32) {
        self.t0 = Some(t0);
        self.cnt = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
        self.sum = 0.0;
        self.lst = 0.0;
    }

    fn accumulate(&mut self, val: f64) {
        self.cnt += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);
        self.sum += val;
        self.lst = val;
    }

    fn finalize(&self) -> FinalizedWindow {
        FinalizedWindow {
            t0: self.t0.expect("finalize called on an un-started bucket"),
            cnt: self.cnt,
            min: self.min,
            max: self.max,
            sum: self.sum,
            lst: self.lst,
        }
    }

    /// Feed a raw point at native resolution. Returns a finalized window if
    /// this point closed out the previous one.
    fn add(&mut self, ts: u32, val: f64) -> Option<FinalizedWindow> {
        let t0 = ts - (ts % self.span);
        match self.t0 {
            None => {
                self.reset(t0);
                self.accumulate(val);
                None
            }
            Some(cur) if cur == t0 => {
                self.accumulate(val);
                None
            }
            Some(cur) if t0 > cur => {
                let finalized = self.finalize();
                self.reset(t0);
                self.accumulate(val);
                Some(finalized)
            }
            Some(_) => {
                // Arrived before the bucket currently accumulating; the raw
                // series already enforces monotonic ingestion per-chunk, so
                // this only happens across a rollover race and is dropped
                // the same way a too-old raw point would be.
                None
            }
        }
    }
}

/// One consolidator's own rollup archive, fed the finalized value for every
/// window closed by the parent's accumulator.
struct RollupChild {
    consolidator: Consolidator,
    series: Arc<SeriesStore>,
}

/// All rollup children sharing one aggregation span, plus the running
/// accumulator that produces their input.
pub struct Aggregator {
    agg_span: u32,
    bucket: AggregationBucket,
    children: Vec<RollupChild>,
}

impl Aggregator {
    /// Build an aggregator (and its consolidator child series) from a
    /// configured rollup definition. `drop_first_chunk` is the parent
    /// series' own setting, passed down to every rollup child the same way
    /// `NewAggMetric` threads it into `NewAggregator`.
    pub fn new(
        parent_key: &SeriesKey,
        rollup: &RollupDefinition,
        drop_first_chunk: bool,
        store: Arc<dyn Store>,
        cache: Arc<dyn CachePusher>,
        cluster: Arc<dyn ClusterRole>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let children = rollup
            .consolidators
            .iter()
            .copied()
            .map(|consolidator| {
                let child_key = SeriesKey::archive(parent_key.metric_id(), rollup.agg_span, consolidator);
                let child_config = SeriesStoreConfig {
                    retention: rollup.retention,
                    reorder_window: 0,
                    drop_first_chunk,
                    aggregation: Default::default(),
                };
                let series = SeriesStore::new(
                    child_key,
                    child_config,
                    Arc::clone(&store),
                    Arc::clone(&cache),
                    Arc::clone(&cluster),
                    Arc::clone(&metrics),
                );
                RollupChild { consolidator, series }
            })
            .collect();

        Self {
            agg_span: rollup.agg_span,
            bucket: AggregationBucket::new(rollup.agg_span),
            children,
        }
    }

    /// Rollup span this aggregator accumulates into.
    pub fn agg_span(&self) -> u32 {
        self.agg_span
    }

    /// Feed one raw-resolution point, fanning out to every child when a
    /// consolidation window closes.
    pub fn feed(&mut self, ts: u32, val: f64) {
        if let Some(finalized) = self.bucket.add(ts, val) {
            for child in &self.children {
                let value = finalized.value_for(child.consolidator);
                child.series.add(finalized.t0, value);
            }
        }
    }

    /// The child series for a given consolidator, if configured.
    pub fn child(&self, consolidator: Consolidator) -> Option<&Arc<SeriesStore>> {
        self.children
            .iter()
            .find(|c| c.consolidator == consolidator)
            .map(|c| &c.series)
    }

    /// Run GC over every child; a parent rollup span is collectible only if
    /// every one of its children is.
    pub fn gc(&self, now: u32, chunk_min_ts: u32, metric_min_ts: u32) -> bool {
        self.children
            .iter()
            .map(|c| c.series.gc(now, chunk_min_ts, metric_min_ts))
            .fold(true, |acc, collected| acc && collected)
    }
}
