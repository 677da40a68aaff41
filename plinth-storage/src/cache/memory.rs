//! In-memory cache store with lazy TTL expiry.

use super::keys::{CacheKey, KeyPattern};
use super::traits::{CacheStats, CacheStore};
use async_trait::async_trait;
use plinth_core::PlinthResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-memory [`CacheStore`] backend.
///
/// Entries expire lazily: an expired entry is dropped on the read that
/// observes it, and pattern removal also discards any expired entries it
/// walks past.
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> PlinthResult<Option<serde_json::Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key.as_str()) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {} // expired, fall through to remove
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
            }
        }

        // Expired entry observed: drop it under the write lock. Re-check the
        // deadline in case a writer replaced it between locks.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key.as_str()) {
            if entry.expires_at <= Instant::now() {
                entries.remove(key.as_str());
                self.expirations.fetch_add(1, Ordering::Relaxed);
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: serde_json::Value,
        ttl: Duration,
    ) -> PlinthResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.as_str().to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> PlinthResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key.as_str()).is_some())
    }

    async fn remove_by_pattern(&self, pattern: &KeyPattern) -> PlinthResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0u64;
        entries.retain(|key, entry| {
            if entry.expires_at <= now {
                return false;
            }
            if pattern.matches(key) {
                removed += 1;
                return false;
            }
            true
        });
        Ok(removed)
    }

    async fn stats(&self) -> PlinthResult<CacheStats> {
        let entries = self.entries.read().await;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            expirations: self.expirations.load(Ordering::Relaxed),
        })
    }
}
