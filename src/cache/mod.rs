//! Key-value cache backends for translation pairs.
//! Flat string → string entries, no TTL, no eviction on the authoritative backend.

pub mod hot;
pub mod memory;
pub mod redis;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{CacheBackend, CacheConfig};

pub use hot::HotCache;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache worker failed: {0}")]
    Worker(String),
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Backend-agnostic cache interface used by the lookup orchestrator.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Short backend name for logs and the health endpoint.
    fn name(&self) -> &'static str;
}

/// Build the configured backend, wrapped in the hot tier when enabled.
pub async fn open_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    let backend: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
        CacheBackend::Redis => {
            let url = config.url.as_deref().ok_or_else(|| {
                CacheError::Unavailable("redis backend requires cache.url".into())
            })?;
            Arc::new(RedisStore::new(url)?)
        }
    };

    if config.hot_capacity > 0 {
        info!(
            backend = backend.name(),
            capacity = config.hot_capacity,
            "hot cache tier enabled"
        );
        return Ok(Arc::new(HotCache::new(backend, config.hot_capacity)));
    }

    Ok(backend)
}
