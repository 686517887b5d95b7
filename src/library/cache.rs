use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Least-recently-used memo shared between requests. A capacity of zero
/// turns every call into a miss.
///
/// Entries are never invalidated on filesystem changes.
pub struct BoundedCache<K: Hash + Eq, V: Clone> {
    inner: Option<Mutex<LruCache<K, V>>>,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.as_ref()?;
        let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        if let Some(cache) = self.inner.as_ref() {
            let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.put(key, value);
        }
    }

    /// Returns the cached value or computes, stores and returns a fresh one.
    /// The lock is not held while `compute` runs, so two callers may both
    /// compute the same key; the later insert wins.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .map(|cache| {
                cache
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len()
            })
            .unwrap_or(0)
    }
}
