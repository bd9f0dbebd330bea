//! Redis cache implementation
//!
//! Shared cache for deployments running several server processes. All keys
//! are stored under a site prefix so that `clear` never touches data that
//! belongs to other applications on the same Redis database.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Default TTL for cache entries (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Number of keys to scan per iteration in delete_pattern
const SCAN_COUNT: usize = 100;

/// Prefix applied to every key written by this process
const KEY_PREFIX: &str = "nlpers:";

/// Redis cache implementation
pub struct RedisCache {
    connection: MultiplexedConnection,
    default_ttl: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect with the default TTL
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_ttl(redis_url, DEFAULT_TTL).await
    }

    /// Connect with a custom fallback TTL
    pub async fn with_ttl(redis_url: &str, default_ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            connection,
            default_ttl,
        })
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn full_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    /// Number of keys under the site prefix
    pub async fn key_count(&self) -> Result<u64> {
        Ok(self.scan(&Self::full_key("*")).await?.len() as u64)
    }

    async fn scan(&self, redis_pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(redis_pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .context("Failed to scan keys in Redis")?;

            found.extend(keys);
            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl CacheLayer for RedisCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(Self::full_key(key))
            .await
            .context("Failed to get value from Redis")?;

        match result {
            Some(json) => {
                let value =
                    serde_json::from_str(&json).context("Failed to deserialize cached value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.connection.clone();

        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(Self::full_key(key), json, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(Self::full_key(key))
            .await
            .context("Failed to delete key from Redis")?;

        Ok(())
    }

    /// SCAN + DEL; Redis understands the same `*` / `?` globs as the memory cache
    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let keys = self.scan(&Self::full_key(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let mut deleted = 0u64;
        for chunk in keys.chunks(SCAN_COUNT) {
            let n: u64 = conn
                .del(chunk.to_vec())
                .await
                .context("Failed to delete keys from Redis")?;
            deleted += n;
        }

        Ok(deleted)
    }

    async fn clear(&self) -> Result<()> {
        self.delete_pattern("*").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    // Run with: cargo test --features redis-cache -- --ignored

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_set_get_delete() {
        let cache = RedisCache::new(&get_redis_url()).await.unwrap();

        cache
            .set("test:key1", &"value1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let result: Option<String> = cache.get("test:key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));

        cache.delete("test:key1").await.unwrap();
        let result: Option<String> = cache.get("test:key1").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_delete_pattern_by_namespace() {
        let cache = RedisCache::new(&get_redis_url()).await.unwrap();
        let ttl = Duration::from_secs(60);

        cache.set("posts_list:a", &1, ttl).await.unwrap();
        cache.set("posts_list:b", &2, ttl).await.unwrap();
        cache.set("recent_posts:c", &3, ttl).await.unwrap();

        let deleted = cache.delete_pattern("posts_list:*").await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(cache.get::<i32>("posts_list:a").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("recent_posts:c").await.unwrap(), Some(3));

        cache.delete("recent_posts:c").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_ttl_expiration() {
        let cache = RedisCache::new(&get_redis_url()).await.unwrap();

        cache
            .set("test:ttl_key", &"value".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let result: Option<String> = cache.get("test:ttl_key").await.unwrap();
        assert_eq!(result, None);
    }
}
