//! Compiled-validator cache.
//!
//! Entries are built lazily, at most once per key in the common case, and
//! never evicted: keys are bounded by routes × content types. The lock is
//! not held while building, so two requests racing on a cold key may both
//! compile; the first insert wins and both get a working validator.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Key → shared compiled value.
#[derive(Debug)]
pub struct ValidatorCache<V> {
    entries: RwLock<HashMap<String, Arc<V>>>,
}

impl<V> Default for ValidatorCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> ValidatorCache<V> {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value for `key`.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.entries.read().get(key).cloned()
    }

    /// The cached value for `key`, building and storing it on a miss.
    /// Build errors are returned and nothing is stored.
    pub fn get_or_try_insert_with<E, F>(&self, key: &str, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let built = Arc::new(build()?);
        let mut entries = self.entries.write();
        Ok(entries
            .entry(key.to_string())
            .or_insert(built)
            .clone())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builds_once_per_key() {
        let cache = ValidatorCache::<String>::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>("compiled".to_string())
        };
        let a = cache.get_or_try_insert_with("GET-/pets-not_provided", build).unwrap();
        let b = cache.get_or_try_insert_with("GET-/pets-not_provided", build).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let cache = ValidatorCache::<u32>::new();
        assert!(cache.get_or_try_insert_with("k", || Err("boom")).is_err());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_try_insert_with("k", || Ok::<_, &str>(7)).unwrap(), 7);
    }

    #[test]
    fn concurrent_cold_access_keeps_one_entry() {
        let cache = Arc::new(ValidatorCache::<usize>::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || *cache.get_or_try_insert_with("k", || Ok::<_, ()>(i)).unwrap())
            })
            .collect();
        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]), "all callers see the winning entry: {results:?}");
        assert_eq!(cache.len(), 1);
    }
}
