//! Concurrent index from series key to `SeriesStore`, and the GC sweep that
//! owns series lifecycle end-to-end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::core::config::{MaintenanceConfig, SeriesStoreConfig};
use crate::core::error::Result;
use crate::core::metrics::Metrics;
use crate::storage::cache::CachePusher;
use crate::storage::cluster::ClusterRole;
use crate::storage::store::Store;
use crate::types::key::SeriesKey;

use super::result::GetResult;
use super::series_store::SeriesStore;

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as u32
}

/// Outer index that creates a `SeriesStore` on first write for a new key
/// and evicts it once GC says it's idle. Keyed concurrently via `DashMap`,
/// the same shape used elsewhere in this codebase for per-key isolation.
pub struct SeriesIndex {
    entries: DashMap<SeriesKey, Arc<SeriesStore>>,
    config_factory: Box<dyn Fn(&SeriesKey) -> SeriesStoreConfig + Send + Sync>,
    store: Arc<dyn Store>,
    cache: Arc<dyn CachePusher>,
    cluster: Arc<dyn ClusterRole>,
    metrics: Arc<Metrics>,
}

impl SeriesIndex {
    /// Build an index. `config_factory` decides the retention/aggregation
    /// policy for a newly-seen key — most deployments return the same
    /// config for every key, but per-metric overrides are supported.
    pub fn new(
        config_factory: impl Fn(&SeriesKey) -> SeriesStoreConfig + Send + Sync + 'static,
        store: Arc<dyn Store>,
        cache: Arc<dyn CachePusher>,
        cluster: Arc<dyn ClusterRole>,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            config_factory: Box::new(config_factory),
            store,
            cache,
            cluster,
            metrics,
        })
    }

    /// Look up an existing series, creating it if this is the first time
    /// `key` has been seen.
    pub fn get_or_create(&self, key: &SeriesKey) -> Arc<SeriesStore> {
        if let Some(existing) = self.entries.get(key) {
            return Arc::clone(existing.value());
        }
        self.entries
            .entry(key.clone())
            .or_insert_with(|| {
                let config = (self.config_factory)(key);
                SeriesStore::new(
                    key.clone(),
                    config,
                    Arc::clone(&self.store),
                    Arc::clone(&self.cache),
                    Arc::clone(&self.cluster),
                    Arc::clone(&self.metrics),
                )
            })
            .clone()
    }

    /// Ingest a sample for `key`, creating the series if necessary.
    pub fn add(&self, key: &SeriesKey, ts: u32, val: f64) {
        self.get_or_create(key).add(ts, val);
    }

    /// Range-query an existing series. `None` if the key has never been seen.
    pub fn get(&self, key: &SeriesKey, from: u32, to: u32) -> Option<Result<GetResult>> {
        self.entries.get(key).map(|entry| entry.value().get(from, to))
    }

    /// Number of series currently held (raw series only — aggregator
    /// children are owned by their parent, not indexed here).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index currently holds no series.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run one GC sweep over every indexed series, evicting the ones GC
    /// reports as collectible. Returns the number evicted.
    pub fn sweep(&self, now: u32, chunk_min_ts: u32, metric_min_ts: u32) -> usize {
        let to_remove: Vec<SeriesKey> = self
            .entries
            .iter()
            .filter_map(|entry| {
                if entry.value().gc(now, chunk_min_ts, metric_min_ts) {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        let evicted = to_remove.len();
        for key in to_remove {
            self.entries.remove(&key);
        }
        evicted
    }

    /// Spawn a background thread that calls `sweep` on a fixed interval
    /// until the returned handle is stopped or dropped. `bounds(now)`
    /// computes `(chunk_min_ts, metric_min_ts)` for each sweep — left to the
    /// caller because only it knows the retention windows in play across a
    /// heterogeneous set of metrics.
    pub fn spawn_maintenance(
        self: &Arc<Self>,
        config: MaintenanceConfig,
        bounds: impl Fn(u32) -> (u32, u32) + Send + 'static,
    ) -> MaintenanceHandle {
        let index = Arc::clone(self);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("tsbuf-maintenance".to_string())
            .spawn(move || {
                while !stop_clone.load(Ordering::Acquire) {
                    let now = now_secs();
                    let (chunk_min_ts, metric_min_ts) = bounds(now);
                    let evicted = index.sweep(now, chunk_min_ts, metric_min_ts);
                    if evicted > 0 {
                        tracing::debug!(evicted, "GC sweep evicted idle series");
                    }
                    std::thread::park_timeout(Duration::from_secs(config.sweep_interval_secs));
                }
            })
            .expect("failed to spawn maintenance thread");

        MaintenanceHandle {
            stop,
            handle: Some(handle),
        }
    }
}

/// Handle to a running maintenance thread. Dropping it stops the thread.
pub struct MaintenanceHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Signal the maintenance thread to stop and wait for it to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AggregationConfig, Retention};
    use crate::storage::cache::NullCachePusher;
    use crate::storage::cluster::StaticClusterRole;
    use crate::storage::store::ChannelStore;

    fn build_index() -> Arc<SeriesIndex> {
        let store: Arc<dyn Store> = Arc::new(ChannelStore::no_op(16, 1));
        let cache: Arc<dyn CachePusher> = Arc::new(NullCachePusher);
        let cluster: Arc<dyn ClusterRole> = Arc::new(StaticClusterRole::new(false));
        let metrics = Arc::new(Metrics::new().unwrap());
        SeriesIndex::new(
            |_key| SeriesStoreConfig {
                retention: Retention::new(600, 5, 0),
                reorder_window: 0,
                drop_first_chunk: false,
                aggregation: AggregationConfig::default(),
            },
            store,
            cache,
            cluster,
            metrics,
        )
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let index = build_index();
        let key = SeriesKey::raw("metric.a");
        let a = index.get_or_create(&key);
        let b = index.get_or_create(&key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn sweep_evicts_idle_series() {
        let index = build_index();
        let key = SeriesKey::raw("metric.a");
        index.add(&key, 1000, 1.0);

        // First sweep: open chunk -> Finish(), not yet evicted.
        assert_eq!(index.sweep(600 + 600 + 901, 2000, 2000), 0);
        assert_eq!(index.len(), 1);

        // Second sweep: chunk closed, last_write stale -> evicted.
        assert_eq!(index.sweep(600 + 600 + 901, 2000, 2000), 1);
        assert_eq!(index.len(), 0);
    }
}
