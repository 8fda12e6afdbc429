//! Write-once concurrent map: compute-if-absent.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

/// Each key is initialized at most once. A failed fallible initializer leaves
/// the key empty, so a later call retries it. Populated values are shared read-only.
#[derive(Debug)]
pub struct OnceMap<V> {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<V>>>>>,
}

impl<V> Default for OnceMap<V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> OnceMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, running `init` if none is stored yet.
    /// Concurrent callers for the same key wait on a single initializer.
    pub async fn get_or_try_init<E, F, Fut>(&self, key: &str, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.cell(key)
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Infallible variant of [`OnceMap::get_or_try_init`].
    pub async fn get_or_init<F, Fut>(&self, key: &str, init: F) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.cell(key)
            .get_or_init(|| async { Arc::new(init().await) })
            .await
            .clone()
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<Arc<V>>> {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.entry(key.to_string()).or_default().clone()
    }

    /// Number of keys holding a value.
    #[cfg(test)]
    pub fn populated(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.values().filter(|cell| cell.initialized()).count()
    }
}
