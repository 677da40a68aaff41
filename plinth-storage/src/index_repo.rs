//! Search index repository: the versioned, soft-deletable index table.
//!
//! Exclusively written by the indexing coordinator; the query engine only
//! reads. The uniqueness invariant lives here: at most one non-tombstoned
//! record per `(entity_kind, entity_id)`, enforced by upserting against the
//! live record rather than inserting blindly.

use async_trait::async_trait;
use chrono::Utc;
use plinth_core::{
    EntityId, EntityKind, IndexDocument, PlinthResult, SearchIndexRecord, Timestamp,
};
use tokio::sync::RwLock;

/// Store for [`SearchIndexRecord`] rows.
#[async_trait]
pub trait SearchIndexRepository: Send + Sync {
    /// Insert or update the live record for the document's identity.
    ///
    /// Looks up the live `(entity_kind, entity_id)` record first and updates
    /// it in place; only inserts when no live record exists.
    async fn upsert(&self, doc: IndexDocument) -> PlinthResult<SearchIndexRecord>;

    /// The live record for an identity, if any.
    async fn get_live(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> PlinthResult<Option<SearchIndexRecord>>;

    /// All live records.
    async fn live_records(&self) -> PlinthResult<Vec<SearchIndexRecord>>;

    /// Number of live records.
    async fn live_count(&self) -> PlinthResult<u64>;

    /// Tombstone the live record for an identity. Returns false if there
    /// was none.
    async fn tombstone(&self, kind: EntityKind, entity_id: EntityId) -> PlinthResult<bool>;

    /// Tombstone every live record. Returns the number tombstoned.
    async fn tombstone_all(&self) -> PlinthResult<u64>;

    /// Physically remove tombstones deleted before `older_than`.
    async fn purge_tombstones(&self, older_than: Timestamp) -> PlinthResult<u64>;
}

/// In-memory index repository over an async `RwLock<Vec>`.
pub struct InMemorySearchIndex {
    records: RwLock<Vec<SearchIndexRecord>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Total rows held, tombstones included. Test observability.
    pub async fn raw_len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndexRepository for InMemorySearchIndex {
    async fn upsert(&self, doc: IndexDocument) -> PlinthResult<SearchIndexRecord> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        if let Some(existing) = records
            .iter_mut()
            .find(|r| !r.is_deleted && r.entity_kind == doc.entity_kind && r.entity_id == doc.entity_id)
        {
            existing.apply_document(doc, now);
            return Ok(existing.clone());
        }
        let record = SearchIndexRecord::from_document(doc, now);
        records.push(record.clone());
        Ok(record)
    }

    async fn get_live(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> PlinthResult<Option<SearchIndexRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| !r.is_deleted && r.entity_kind == kind && r.entity_id == entity_id)
            .cloned())
    }

    async fn live_records(&self) -> PlinthResult<Vec<SearchIndexRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| !r.is_deleted).cloned().collect())
    }

    async fn live_count(&self) -> PlinthResult<u64> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| !r.is_deleted).count() as u64)
    }

    async fn tombstone(&self, kind: EntityKind, entity_id: EntityId) -> PlinthResult<bool> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|r| !r.is_deleted && r.entity_kind == kind && r.entity_id == entity_id)
        {
            Some(record) => {
                record.tombstone(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn tombstone_all(&self) -> PlinthResult<u64> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let mut swept = 0u64;
        for record in records.iter_mut().filter(|r| !r.is_deleted) {
            record.tombstone(now);
            swept += 1;
        }
        Ok(swept)
    }

    async fn purge_tombstones(&self, older_than: Timestamp) -> PlinthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| match (r.is_deleted, r.deleted_at) {
            (true, Some(deleted_at)) => deleted_at >= older_than,
            _ => true,
        });
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::new_entity_id;
    use std::collections::HashMap;

    fn doc(kind: EntityKind, entity_id: EntityId, title: &str) -> IndexDocument {
        IndexDocument {
            entity_kind: kind,
            entity_id,
            title: title.to_string(),
            content: format!("{} content", title),
            search_vector: title.to_lowercase(),
            is_public: true,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_never_duplicates_identity() {
        let index = InMemorySearchIndex::new();
        let id = new_entity_id();

        let mut last_indexed = None;
        for i in 0..5 {
            let record = index
                .upsert(doc(EntityKind::Page, id, &format!("Title v{}", i)))
                .await
                .unwrap();
            if let Some(previous) = last_indexed {
                assert!(record.last_indexed_at >= previous);
            }
            last_indexed = Some(record.last_indexed_at);
        }

        assert_eq!(index.live_count().await.unwrap(), 1);
        assert_eq!(index.raw_len().await, 1);
        let live = index.get_live(EntityKind::Page, id).await.unwrap().unwrap();
        assert_eq!(live.title, "Title v4");
    }

    #[tokio::test]
    async fn test_same_id_different_kind_is_distinct() {
        let index = InMemorySearchIndex::new();
        let id = new_entity_id();
        index.upsert(doc(EntityKind::Page, id, "Page")).await.unwrap();
        index.upsert(doc(EntityKind::File, id, "File")).await.unwrap();
        assert_eq!(index.live_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tombstone_then_reindex_creates_fresh_record() {
        let index = InMemorySearchIndex::new();
        let id = new_entity_id();
        index.upsert(doc(EntityKind::Page, id, "Original")).await.unwrap();
        assert!(index.tombstone(EntityKind::Page, id).await.unwrap());
        assert_eq!(index.live_count().await.unwrap(), 0);

        // Reindex after tombstone inserts a new live record; the tombstone
        // stays behind for the purge sweep.
        index.upsert(doc(EntityKind::Page, id, "Rebuilt")).await.unwrap();
        assert_eq!(index.live_count().await.unwrap(), 1);
        assert_eq!(index.raw_len().await, 2);
    }

    #[tokio::test]
    async fn test_tombstone_absent_is_noop() {
        let index = InMemorySearchIndex::new();
        assert!(!index.tombstone(EntityKind::Page, new_entity_id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_tombstone_all_sweeps_live_records() {
        let index = InMemorySearchIndex::new();
        for _ in 0..3 {
            index
                .upsert(doc(EntityKind::File, new_entity_id(), "f"))
                .await
                .unwrap();
        }
        assert_eq!(index.tombstone_all().await.unwrap(), 3);
        assert_eq!(index.live_count().await.unwrap(), 0);
        // Idempotent on an already-swept index.
        assert_eq!(index.tombstone_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_respects_retention_cutoff() {
        let index = InMemorySearchIndex::new();
        let id = new_entity_id();
        index.upsert(doc(EntityKind::Page, id, "Old")).await.unwrap();
        index.tombstone(EntityKind::Page, id).await.unwrap();
        index
            .upsert(doc(EntityKind::Page, new_entity_id(), "Live"))
            .await
            .unwrap();

        // Cutoff in the past: the fresh tombstone survives.
        let purged = index
            .purge_tombstones(Utc::now() - chrono::Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(purged, 0);

        // Cutoff in the future: the tombstone goes, the live record stays.
        let purged = index
            .purge_tombstones(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(index.live_count().await.unwrap(), 1);
        assert_eq!(index.raw_len().await, 1);
    }
}
