//! Cache store trait, statistics, and the read-through helper.

use super::keys::{CacheKey, KeyPattern};
use async_trait::async_trait;
use plinth_core::PlinthResult;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;

/// Default TTL for cached entity reads (1 hour).
pub const DEFAULT_ENTRY_TTL_SECS: u64 = 3600;

/// Key-value cache with TTL and native pattern removal.
///
/// Values are JSON documents; callers serialize on the way in and
/// deserialize on the way out (see [`get_or_add`]). Implementations must be
/// multi-writer safe: this layer adds no locking of its own.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> PlinthResult<Option<serde_json::Value>>;

    async fn set(
        &self,
        key: &CacheKey,
        value: serde_json::Value,
        ttl: Duration,
    ) -> PlinthResult<()>;

    /// Remove a single key. Returns whether it was present.
    async fn remove(&self, key: &CacheKey) -> PlinthResult<bool>;

    /// Remove every key matching the pattern. Returns the removal count.
    async fn remove_by_pattern(&self, pattern: &KeyPattern) -> PlinthResult<u64>;

    async fn stats(&self) -> PlinthResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped by TTL expiry.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Configuration for cached entity reads.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to cached entities, lists, and counts.
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(DEFAULT_ENTRY_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Environment Variables
    /// - `PLINTH_CACHE_ENTRY_TTL_SECS`: entity cache TTL (default: 3600)
    pub fn from_env() -> Self {
        let entry_ttl = Duration::from_secs(
            std::env::var("PLINTH_CACHE_ENTRY_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ENTRY_TTL_SECS),
        );
        Self { entry_ttl }
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }
}

/// Read-through helper: return the cached value under `key`, or run the
/// producer, cache its output, and return it.
///
/// Cache failures are advisory on this path: a failed get falls through to
/// the producer, a failed set is logged and the produced value is still
/// returned. An undeserializable cached payload is treated as a miss.
pub async fn get_or_add<C, T, F, Fut>(
    cache: &C,
    key: &CacheKey,
    ttl: Duration,
    producer: F,
) -> PlinthResult<T>
where
    C: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = PlinthResult<T>>,
{
    match cache.get(key).await {
        Ok(Some(value)) => match serde_json::from_value::<T>(value) {
            Ok(cached) => {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(cached);
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cached payload failed to deserialize, treating as miss");
            }
        },
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache read failed, falling through to producer");
        }
    }

    let produced = producer().await?;

    match serde_json::to_value(&produced) {
        Ok(value) => {
            if let Err(e) = cache.set(key, value, ttl).await {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
            }
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Value not cacheable");
        }
    }

    Ok(produced)
}
