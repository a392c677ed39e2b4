//! In-memory LRU cache backend.

use std::{
    num::NonZeroUsize,
    sync::Mutex,
    time::{Duration, Instant},
};

use bytes::Bytes;
use chainmgr_traits::{Cache, CacheError};
use lru::LruCache;

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// In-memory LRU cache with per-entry TTL.
///
/// Used by tests and single-process deployments; production runs point at
/// [`crate::RedisCache`] instead.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(1024).expect("nonzero literal"));
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").finish_non_exhaustive()
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries =
            self.entries.lock().map_err(|e| CacheError(format!("lock poisoned: {e}")))?;
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            entries.pop(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut entries =
            self.entries.lock().map_err(|e| CacheError(format!("lock poisoned: {e}")))?;
        entries.put(key.to_string(), Entry { value, expires_at: Instant::now() + ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries =
            self.entries.lock().map_err(|e| CacheError(format!("lock poisoned: {e}")))?;
        entries.pop(key);
        Ok(())
    }
}
