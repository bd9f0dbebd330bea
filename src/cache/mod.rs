//! Cache layer
//!
//! Read-through caching for the blog and archive queries:
//! - In-memory cache (moka), the default for a single process
//! - Redis cache, optional, for several processes behind one balancer
//!
//! The cache driver is selected based on configuration. Keys are derived in
//! [`keys`]; the query-level caches live in `services::blog_cache` and
//! `services::archive_cache`.

pub mod keys;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

/// Cache layer trait
///
/// Generic methods make this trait unusable as `dyn CacheLayer`; use the
/// [`Cache`] enum for runtime polymorphism.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL (zero means the backend default)
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration)
        -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern, returning how many went
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Unified cache enum for runtime polymorphism
#[derive(Debug)]
pub enum Cache {
    /// In-memory cache using moka
    Memory(MemoryCache),
    /// Redis cache for multi-process deployment
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

/// Backend summary printed by `clear-cache`
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub backend: &'static str,
    pub entries: u64,
}

impl Cache {
    /// Backend name and current number of entries
    pub async fn info(&self) -> Result<CacheInfo> {
        match self {
            Cache::Memory(cache) => Ok(CacheInfo {
                backend: "memory",
                entries: cache.entry_count().await,
            }),
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => Ok(CacheInfo {
                backend: "redis",
                entries: cache.key_count().await?,
            }),
        }
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        match self {
            Cache::Memory(cache) => cache.delete_pattern(pattern).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete_pattern(pattern).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.clear().await,
        }
    }
}

/// Read-through lookup: the cached value for `key`, or `load()` stored under it
///
/// Backend errors are logged and treated as a miss; they never fail the caller.
pub async fn get_or_load<T, F, Fut>(cache: &Cache, key: &str, ttl: Duration, load: F) -> Result<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match cache.get::<T>(key).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
    }

    let value = load().await?;
    if let Err(e) = cache.set(key, &value, ttl).await {
        tracing::warn!("Cache write failed for {}: {}", key, e);
    }
    Ok(value)
}

/// Create a cache instance based on configuration
///
/// # Errors
/// - Redis is configured but the `redis-cache` feature is not enabled
/// - Redis is configured without a URL, or the connection fails
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);

    match config.driver {
        CacheDriver::Memory => {
            let cache = MemoryCache::with_capacity_and_ttl(config.max_entries, ttl);
            Ok(Arc::new(Cache::Memory(cache)))
        }
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using Redis cache driver. \
                         Set 'redis_url' in cache configuration or NLPERS_CACHE_REDIS_URL."
                    )
                })?;

                let cache = RedisCache::with_ttl(redis_url, ttl).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled. \
                     Either enable the feature with `--features redis-cache` or use 'memory' cache driver."
                )
            }
        }
    }
}
