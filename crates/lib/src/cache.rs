//! Reply correlation: original message ts -> ts of the reply we posted for it.
//!
//! Bounded LRU; when full, inserting evicts the least recently used entry. Lets an edited
//! request update its earlier reply instead of posting a new one.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("reply cache capacity must be positive")]
    ZeroCapacity,
}

/// In-memory LRU map shared between the compile stage and whoever wires it up.
pub struct ReplyCache {
    inner: Mutex<LruCache<String, String>>,
}

impl ReplyCache {
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::ZeroCapacity)?;
        Ok(Self {
            inner: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Record the reply posted for `original_ts`. Replaces any earlier reply for the same key.
    pub fn insert(&self, original_ts: impl Into<String>, reply_ts: impl Into<String>) {
        self.lock().put(original_ts.into(), reply_ts.into());
    }

    /// Reply ts for `original_ts`; marks the entry as recently used.
    pub fn get(&self, original_ts: &str) -> Option<String> {
        self.lock().get(original_ts).cloned()
    }

    /// Presence check; does not touch recency.
    pub fn contains(&self, original_ts: &str) -> bool {
        self.lock().contains(original_ts)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the LRU half-updated, so poisoning is ignored.
    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, String>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
