//! The persistent store write queue.
//!
//! `Store::add` may block — a full write queue is the mechanism by which
//! slow downstream persistence propagates backpressure to upstream writers.
//! `ChunkWriteRequest` carries a boxed callback rather than a reference back
//! to the owning series: the store (and its worker threads) never need to
//! know about `SeriesStore` at all, which avoids the cyclic-reference shape
//! a raw back-pointer would require.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::types::key::SeriesKey;

/// One chunk handed to the persistent store for durable commit.
pub struct ChunkWriteRequest {
    /// Series (or rollup archive) this chunk belongs to.
    pub key: SeriesKey,
    /// Chunk span of the owning series, in seconds.
    pub span: u32,
    /// Time-to-live of the owning series, in seconds.
    pub ttl: u32,
    /// Encoded chunk bytes.
    pub chunk_bytes: Vec<u8>,
    /// Aligned bucket start of the chunk.
    pub t0: u32,
    on_commit: Box<dyn FnOnce(u32) + Send>,
}

impl ChunkWriteRequest {
    /// Build a write request, capturing the callback to invoke on durable
    /// commit. The callback is typically a cloned `SeriesStore` handle
    /// invoking its own `sync_chunk_save_state`.
    pub fn new(
        key: SeriesKey,
        span: u32,
        ttl: u32,
        chunk_bytes: Vec<u8>,
        t0: u32,
        on_commit: impl FnOnce(u32) + Send + 'static,
    ) -> Self {
        Self {
            key,
            span,
            ttl,
            chunk_bytes,
            t0,
            on_commit: Box::new(on_commit),
        }
    }

    /// Invoke the commit callback. The store calls this once the chunk is
    /// durably written.
    pub fn commit(self) {
        (self.on_commit)(self.t0);
    }
}

/// The persistent store abstraction the storage core writes sealed chunks
/// to. Implementations must be thread-safe and must eventually call back
/// (via `ChunkWriteRequest::commit`) once a chunk is durable.
pub trait Store: Send + Sync {
    /// Enqueue a chunk for durable commit. May block if the store is
    /// applying backpressure.
    fn add(&self, req: ChunkWriteRequest);
}

/// A bounded-channel-backed `Store` drained by a small pool of named
/// worker threads. The bounded channel is what provides backpressure for
/// free: `Sender::send` blocks once the channel is full, which is exactly
/// the "the calling write is intentionally paused" behavior the persist
/// path requires.
pub struct ChannelStore {
    sender: crossbeam::channel::Sender<ChunkWriteRequest>,
    workers: Vec<JoinHandle<()>>,
}

impl ChannelStore {
    /// Build a `ChannelStore` with a bounded queue of `capacity` requests,
    /// drained by `num_workers` threads each running `sink` against every
    /// request before committing it.
    pub fn new<F>(capacity: usize, num_workers: usize, sink: F) -> Self
    where
        F: Fn(&ChunkWriteRequest) + Send + Sync + 'static,
    {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        let sink = Arc::new(sink);

        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let receiver = receiver.clone();
            let sink = Arc::clone(&sink);
            let handle = std::thread::Builder::new()
                .name(format!("tsbuf-store-{i}"))
                .spawn(move || {
                    while let Ok(req) = receiver.recv() {
                        sink(&req);
                        req.commit();
                    }
                })
                .expect("failed to spawn store worker thread");
            workers.push(handle);
        }

        Self { sender, workers }
    }

    /// A `ChannelStore` whose sink is a no-op — every chunk commits
    /// immediately once picked up by a worker. Useful in benches and tests
    /// that don't care about persistence latency.
    pub fn no_op(capacity: usize, num_workers: usize) -> Self {
        Self::new(capacity, num_workers, |_req| {})
    }
}

impl Store for ChannelStore {
    fn add(&self, req: ChunkWriteRequest) {
        // Disconnect only happens when every worker thread has exited,
        // which only happens after `self` is dropped; an error here would
        // mean this very sender is already gone, which can't happen while
        // `self` is alive.
        let _ = self.sender.send(req);
    }
}

impl Drop for ChannelStore {
    fn drop(&mut self) {
        // Dropping `sender` here (Rust drops fields in declaration order,
        // but we're explicit) disconnects the channel so every worker's
        // `recv` returns `Err` and the loop exits.
        let (dummy, _) = crossbeam::channel::bounded::<ChunkWriteRequest>(0);
        let sender = std::mem::replace(&mut self.sender, dummy);
        drop(sender);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[test]
    fn commit_callback_fires_with_t0() {
        let committed = Arc::new(AtomicU32::new(0));
        let committed2 = Arc::clone(&committed);
        let req = ChunkWriteRequest::new(
            SeriesKey::raw("metric.a"),
            600,
            0,
            vec![1, 2, 3],
            1200,
            move |t0| committed2.store(t0, Ordering::SeqCst),
        );
        req.commit();
        assert_eq!(committed.load(Ordering::SeqCst), 1200);
    }

    #[test]
    fn channel_store_drains_and_commits_in_order_received() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_sink = Arc::clone(&seen);
        let store = ChannelStore::new(8, 2, move |req| {
            seen_sink.lock().unwrap().push(req.t0);
        });

        let commits = Arc::new(Mutex::new(Vec::new()));
        for t0 in [600u32, 1200, 1800] {
            let commits = Arc::clone(&commits);
            store.add(ChunkWriteRequest::new(
                SeriesKey::raw("metric.a"),
                600,
                0,
                vec![],
                t0,
                move |t0| commits.lock().unwrap().push(t0),
            ));
        }

        drop(store); // joins workers, guaranteeing all requests drained

        let mut got = commits.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, vec![600, 1200, 1800]);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }
}
