//! In-memory LRU tier in front of the authoritative backend.
//! Key: blake3 hash of the cache key. Read-through and write-through;
//! eviction here never removes anything from the backend.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::{CacheError, CacheStore};

pub struct HotCache {
    inner: Mutex<LruCache<[u8; 32], String>>,
    backend: Arc<dyn CacheStore>,
}

impl HotCache {
    /// A zero capacity is bumped to 1.
    pub fn new(backend: Arc<dyn CacheStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            backend,
        }
    }

    fn compute_key(key: &str) -> [u8; 32] {
        *blake3::hash(key.as_bytes()).as_bytes()
    }

    /// Number of entries currently held in the hot tier.
    #[cfg(test)]
    pub(crate) fn hot_len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[async_trait]
impl CacheStore for HotCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let hashed = Self::compute_key(key);
        if let Some(value) = self.inner.lock().get(&hashed) {
            debug!("hot tier hit");
            return Ok(Some(value.clone()));
        }

        let value = self.backend.get(key).await?;
        if let Some(ref v) = value {
            self.inner.lock().put(hashed, v.clone());
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        // Backend first: a failed write must not leave a hot-only entry behind.
        self.backend.set(key, value).await?;
        self.inner
            .lock()
            .put(Self::compute_key(key), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }
}
