//! Write-through cached entity store.

use super::invalidation::CacheInvalidationCoordinator;
use super::keys::CacheKey;
use super::traits::{get_or_add, CacheConfig, CacheStore};
use crate::store::{EntityPredicate, EntityStore};
use async_trait::async_trait;
use plinth_core::{EntityId, PlinthResult, StoredEntity, Timestamp};
use std::marker::PhantomData;
use std::sync::Arc;

/// [`EntityStore`] wrapper that serves reads through the cache and
/// invalidates after every committed write.
///
/// Reads go cache first, then the inner store, repopulating the cache on
/// the way out. Writes commit to the inner store first and only then
/// invalidate; a store error skips invalidation entirely, so the cache is
/// never cleared for a write that did not happen.
///
/// Predicate queries and `updated_since` projections pass straight through:
/// their result sets are unbounded families that cannot be invalidated by
/// key, so caching them would trade correctness for little.
pub struct CachedEntityStore<S, C, T>
where
    S: EntityStore<T>,
    C: CacheStore + ?Sized,
    T: StoredEntity,
{
    store: Arc<S>,
    cache: Arc<C>,
    invalidation: CacheInvalidationCoordinator<C>,
    config: CacheConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<S, C, T> CachedEntityStore<S, C, T>
where
    S: EntityStore<T>,
    C: CacheStore + ?Sized,
    T: StoredEntity,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, config: CacheConfig) -> Self {
        let invalidation = CacheInvalidationCoordinator::new(Arc::clone(&cache));
        Self {
            store,
            cache,
            invalidation,
            config,
            _entity: PhantomData,
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &Arc<S> {
        &self.store
    }
}

#[async_trait]
impl<S, C, T> EntityStore<T> for CachedEntityStore<S, C, T>
where
    S: EntityStore<T>,
    C: CacheStore + ?Sized,
    T: StoredEntity,
{
    async fn get_by_id(&self, id: EntityId) -> PlinthResult<Option<T>> {
        let key = CacheKey::entity(T::kind(), id);
        get_or_add(self.cache.as_ref(), &key, self.config.entry_ttl, || async {
            self.store.get_by_id(id).await
        })
        .await
    }

    async fn get_all(&self) -> PlinthResult<Vec<T>> {
        let key = CacheKey::entity_list(T::kind());
        get_or_add(self.cache.as_ref(), &key, self.config.entry_ttl, || async {
            self.store.get_all().await
        })
        .await
    }

    async fn find(&self, predicate: EntityPredicate<'_, T>) -> PlinthResult<Vec<T>> {
        self.store.find(predicate).await
    }

    async fn add(&self, entity: T) -> PlinthResult<T> {
        let added = self.store.add(entity).await?;
        self.invalidation.invalidate_entity(T::kind(), added.id()).await;
        Ok(added)
    }

    async fn update(&self, entity: T) -> PlinthResult<T> {
        let updated = self.store.update(entity).await?;
        self.invalidation
            .invalidate_entity(T::kind(), updated.id())
            .await;
        Ok(updated)
    }

    async fn soft_delete(&self, id: EntityId) -> PlinthResult<bool> {
        let deleted = self.store.soft_delete(id).await?;
        if deleted {
            self.invalidation.invalidate_entity(T::kind(), id).await;
        }
        Ok(deleted)
    }

    async fn count(&self) -> PlinthResult<u64> {
        let key = CacheKey::entity_count(T::kind());
        get_or_add(self.cache.as_ref(), &key, self.config.entry_ttl, || async {
            self.store.count().await
        })
        .await
    }

    async fn updated_since(&self, since: Timestamp) -> PlinthResult<Vec<T>> {
        self.store.updated_since(since).await
    }
}
