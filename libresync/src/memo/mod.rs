//! Run-scoped memo maps with single-flight initialisation.
//!
//! Concurrent lookups of the same key share one in-flight initialisation;
//! every caller observes its result. A failed initialisation leaves the key
//! empty so a later caller may try again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

#[cfg(test)]
mod tests;

/// A string-keyed memo whose entries are initialised at most once.
#[derive(Debug)]
pub struct SingleFlight<T> {
    cells: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<T>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cells.entry(key.to_string()).or_default())
    }

    /// Returns the memoized value for `key`, running `init` if no value exists yet.
    pub async fn get_or_try_init<E, F, Fut>(&self, key: &str, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = self.cell(key);
        cell.get_or_try_init(init).await.cloned()
    }

    /// Infallible variant of [`SingleFlight::get_or_try_init`].
    pub async fn get_or_init<F, Fut>(&self, key: &str, init: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self.cell(key);
        cell.get_or_init(init).await.clone()
    }

    /// Returns the memoized value for `key` without initialising it.
    pub fn get(&self, key: &str) -> Option<T> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.values().filter(|cell| cell.initialized()).count()
    }

    /// Returns true when no key holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
