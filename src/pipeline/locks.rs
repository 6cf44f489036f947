// per-destination mutual exclusion across concurrent requests

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<PathBuf, Arc<Mutex<()>>>;

/// in-memory lock table keyed by resolved destination path
#[derive(Debug, Clone, Default)]
pub struct DestinationLocks {
    table: Arc<LockTable>,
}

/// held for the duration of one merge; the entry leaves the table
/// when nobody else is waiting on it
#[derive(Debug)]
pub struct DestinationGuard {
    table: Arc<LockTable>,
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// wait until no other request is merging into `path`
    pub async fn lock(&self, path: &Path) -> DestinationGuard {
        let mutex = self
            .table
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        DestinationGuard {
            table: self.table.clone(),
            path: path.to_path_buf(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// number of destinations currently locked or awaited
    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        // table + this guard; anything more is a waiter
        self.table
            .remove_if(&self.path, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
