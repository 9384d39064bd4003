use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Held by any operation that adds blocks or roots.
pub type WriterGuard = OwnedRwLockReadGuard<()>;

/// Held by the garbage collector for a whole collection.
pub type CollectorGuard = OwnedRwLockWriteGuard<()>;

/// Orders writers against garbage collection.
///
/// Writers share the lock with each other and exclude the collector, so
/// a collection sees either none or all of a write's blocks together with
/// the root or pin that references them. Guards must be taken only at the
/// outermost API layer; re-acquiring the writer side while holding it can
/// deadlock once a collector is queued.
#[derive(Clone, Debug, Default)]
pub struct GcLock {
    inner: Arc<RwLock<()>>,
}

impl GcLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the shared writer side.
    pub async fn writer(&self) -> WriterGuard {
        self.inner.clone().read_owned().await
    }

    /// Acquire the exclusive collector side.
    pub async fn collector(&self) -> CollectorGuard {
        self.inner.clone().write_owned().await
    }
}
