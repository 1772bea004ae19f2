//! Cluster role provider.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tells a series whether this node is currently allowed to push chunks to
/// durable storage. Consulted per rollover and per GC cycle — must be cheap
/// and safe to call concurrently.
pub trait ClusterRole: Send + Sync {
    /// Whether this node is primary.
    fn is_primary(&self) -> bool;
}

/// A `ClusterRole` a test can flip between primary/non-primary mid-run.
pub struct StaticClusterRole {
    primary: AtomicBool,
}

impl StaticClusterRole {
    /// Build a role fixed at construction time.
    pub fn new(primary: bool) -> Self {
        Self {
            primary: AtomicBool::new(primary),
        }
    }

    /// Flip the role at runtime (e.g. to simulate a failover in a test).
    pub fn set_primary(&self, primary: bool) {
        self.primary.store(primary, Ordering::SeqCst);
    }
}

impl ClusterRole for StaticClusterRole {
    fn is_primary(&self) -> bool {
        self.primary.load(Ordering::SeqCst)
    }
}

impl Default for StaticClusterRole {
    fn default() -> Self {
        Self::new(true)
    }
}
