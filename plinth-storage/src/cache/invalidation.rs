//! Pattern-based cache invalidation for entity write paths.
//!
//! Invalidation is best-effort by contract: a failed invalidation is logged
//! and never surfaced, because a write that committed must not be rolled
//! back (or reported failed) over a cache hiccup. The cost is a brief
//! window of stale reads if the cache store is misbehaving.

use super::keys::{CacheKey, KeyPattern};
use super::traits::CacheStore;
use plinth_core::{EntityId, EntityKind};
use std::sync::Arc;

/// Maps entity mutations to cache-key invalidation.
///
/// Every mutating operation calls one of these methods after its write
/// commits. Ordering matters: invalidating before a commit that might still
/// fail would leave the cache stale in the failure path.
pub struct CacheInvalidationCoordinator<C: CacheStore + ?Sized> {
    cache: Arc<C>,
}

impl<C: CacheStore + ?Sized> CacheInvalidationCoordinator<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    /// Invalidate everything affected by one entity changing: its own key
    /// plus the key families its kind declares as derived from it.
    pub async fn invalidate_entity(&self, kind: EntityKind, id: EntityId) {
        let key = CacheKey::entity(kind, id);
        if let Err(e) = self.cache.remove(&key).await {
            tracing::warn!(key = %key, error = %e, "Cache invalidation failed");
        }
        for pattern in Self::affected_patterns(kind, id) {
            match self.cache.remove_by_pattern(&pattern).await {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(pattern = %pattern, removed, "Invalidated cache pattern");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Cache pattern invalidation failed");
                }
            }
        }
    }

    /// Invalidate every list/count/aggregate cache for a kind.
    pub async fn invalidate_kind(&self, kind: EntityKind) {
        let pattern = KeyPattern::kind_all(kind);
        if let Err(e) = self.cache.remove_by_pattern(&pattern).await {
            tracing::warn!(pattern = %pattern, error = %e, "Cache kind invalidation failed");
        }
    }

    /// Key families a single entity's change invalidates: any key embedding
    /// this id under the kind's namespace, the kind's listing and count, and
    /// the kind's default singleton.
    fn affected_patterns(kind: EntityKind, id: EntityId) -> [KeyPattern; 4] {
        [
            KeyPattern::new(format!("{}:*:{}", kind.as_str(), id)),
            KeyPattern::new(format!("{}:all", kind.as_str())),
            KeyPattern::new(format!("{}:count", kind.as_str())),
            KeyPattern::new(format!("{}:main", kind.as_str())),
        ]
    }
}

impl<C: CacheStore + ?Sized> Clone for CacheInvalidationCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}
