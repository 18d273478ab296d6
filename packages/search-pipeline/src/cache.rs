//! In-process cache of intent classifications.
//!
//! Keyed by the exact prepared query. Only successful classifications are
//! stored, so a transient model failure is retried on the next request.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::types::intent::Classification;

/// Bounded LRU cache of classifications.
pub struct IntentCache {
    inner: Mutex<LruCache<String, Classification>>,
}

impl IntentCache {
    /// Create a cache. Returns `None` for a zero capacity (caching disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|capacity| Self {
            inner: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn get(&self, query: &str) -> Option<Classification> {
        let mut cache = self.inner.lock().ok()?;
        cache.get(query).cloned()
    }

    pub fn insert(&self, query: &str, classification: Classification) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(query.to_string(), classification);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
