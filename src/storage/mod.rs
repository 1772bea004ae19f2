//! External collaborators: the persistent store, the hot-read cache, and
//! the cluster role provider.

/// The persistent store write queue.
pub mod store;
/// Hot-read cache hookup.
pub mod cache;
/// Cluster role provider.
pub mod cluster;

pub use cache::{CachePusher, LoggingCachePusher, NullCachePusher, PointSource};
pub use cluster::{ClusterRole, StaticClusterRole};
pub use store::{ChannelStore, ChunkWriteRequest, Store};