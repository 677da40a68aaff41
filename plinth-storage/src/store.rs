//! Generic entity store trait and the in-memory backend.

use async_trait::async_trait;
use plinth_core::{EntityId, PlinthResult, StorageError, StoredEntity, Timestamp};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Predicate used by [`EntityStore::find`].
pub type EntityPredicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// CRUD plus predicate query over durable entities.
///
/// Soft-deleted entities are invisible to every read except `get_by_id`,
/// which reports them as absent too; deletion here means tombstoning, the
/// store never physically drops a row on behalf of a caller.
#[async_trait]
pub trait EntityStore<T: StoredEntity>: Send + Sync {
    /// Fetch a live entity by id. Tombstoned entities read as absent.
    async fn get_by_id(&self, id: EntityId) -> PlinthResult<Option<T>>;

    /// All live entities.
    async fn get_all(&self) -> PlinthResult<Vec<T>>;

    /// Live entities matching the predicate.
    async fn find(&self, predicate: EntityPredicate<'_, T>) -> PlinthResult<Vec<T>>;

    /// Insert a new entity. Fails if the id is already present.
    async fn add(&self, entity: T) -> PlinthResult<T>;

    /// Replace an existing entity. Fails with `NotFound` if absent.
    async fn update(&self, entity: T) -> PlinthResult<T>;

    /// Tombstone an entity. Returns false if it was already absent.
    async fn soft_delete(&self, id: EntityId) -> PlinthResult<bool>;

    /// Number of live entities.
    async fn count(&self) -> PlinthResult<u64>;

    /// Live entities whose `updated_at` is at or after `since`.
    ///
    /// This is the projection incremental indexing reads.
    async fn updated_since(&self, since: Timestamp) -> PlinthResult<Vec<T>>;
}

/// In-memory entity store over an async `RwLock<HashMap>`.
///
/// Default backend for tests and embedding hosts; a durable store
/// implements the same trait in production deployments.
pub struct InMemoryEntityStore<T: StoredEntity> {
    entities: RwLock<HashMap<EntityId, T>>,
}

impl<T: StoredEntity> InMemoryEntityStore<T> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Total rows held, tombstones included. Test observability.
    pub async fn raw_len(&self) -> usize {
        self.entities.read().await.len()
    }
}

impl<T: StoredEntity> Default for InMemoryEntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: StoredEntity> EntityStore<T> for InMemoryEntityStore<T> {
    async fn get_by_id(&self, id: EntityId) -> PlinthResult<Option<T>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&id).filter(|e| !e.is_deleted()).cloned())
    }

    async fn get_all(&self) -> PlinthResult<Vec<T>> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|e| !e.is_deleted())
            .cloned()
            .collect())
    }

    async fn find(&self, predicate: EntityPredicate<'_, T>) -> PlinthResult<Vec<T>> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|e| !e.is_deleted() && predicate(e))
            .cloned()
            .collect())
    }

    async fn add(&self, entity: T) -> PlinthResult<T> {
        let mut entities = self.entities.write().await;
        if entities.contains_key(&entity.id()) {
            return Err(StorageError::InsertFailed {
                kind: T::kind(),
                reason: format!("id {} already exists", entity.id()),
            }
            .into());
        }
        entities.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: T) -> PlinthResult<T> {
        let mut entities = self.entities.write().await;
        if !entities.contains_key(&entity.id()) {
            return Err(StorageError::NotFound {
                kind: T::kind(),
                id: entity.id(),
            }
            .into());
        }
        entities.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn soft_delete(&self, id: EntityId) -> PlinthResult<bool> {
        let mut entities = self.entities.write().await;
        match entities.get_mut(&id) {
            Some(entity) if !entity.is_deleted() => {
                entity.mark_deleted(chrono::Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> PlinthResult<u64> {
        let entities = self.entities.read().await;
        Ok(entities.values().filter(|e| !e.is_deleted()).count() as u64)
    }

    async fn updated_since(&self, since: Timestamp) -> PlinthResult<Vec<T>> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|e| !e.is_deleted() && e.updated_at() >= since)
            .cloned()
            .collect())
    }
}
