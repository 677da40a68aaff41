//! Indexing coordinator: keeps the search index consistent with source
//! entities.
//!
//! Failure semantics follow a two-tier rule. Per-entity failures are
//! logged, counted on the job, and never abort a pass; job-level failures
//! (a store that cannot be read, an index that cannot be written) mark the
//! job Failed and surface as `Ok(false)`. Only failures before a job row
//! exists propagate as `Err`.

use crate::config::IndexingConfig;
use crate::extract::{extract_document, Indexable};
use crate::single_flight::ReindexSlot;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use plinth_core::{
    EntityId, EntityKind, IndexDocument, IndexingJob, IndexingJobStatus, IndexingJobType,
    PlinthResult, ScalarValue,
};
use plinth_storage::{EntityStore, JobStore, SearchIndexRepository};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// A load-side adapter feeding one entity kind into the index.
#[async_trait]
pub trait IndexSource: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Extracted documents for every live entity.
    async fn load_all(&self) -> PlinthResult<Vec<IndexDocument>>;

    /// Extracted documents for the given ids only.
    async fn load_by_ids(&self, ids: &[EntityId]) -> PlinthResult<Vec<IndexDocument>>;

    /// Extracted documents for entities updated at or after `since`.
    async fn load_updated_since(
        &self,
        since: plinth_core::Timestamp,
    ) -> PlinthResult<Vec<IndexDocument>>;
}

/// Adapts any [`EntityStore`] of an [`Indexable`] entity into an
/// [`IndexSource`].
pub struct EntitySourceAdapter<S, T> {
    store: Arc<S>,
    max_component_depth: usize,
    _entity: PhantomData<fn() -> T>,
}

impl<S, T> EntitySourceAdapter<S, T> {
    pub fn new(store: Arc<S>, max_component_depth: usize) -> Self {
        Self {
            store,
            max_component_depth,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T> IndexSource for EntitySourceAdapter<S, T>
where
    S: EntityStore<T>,
    T: Indexable,
{
    fn kind(&self) -> EntityKind {
        T::kind()
    }

    async fn load_all(&self) -> PlinthResult<Vec<IndexDocument>> {
        let entities = self.store.get_all().await?;
        Ok(entities
            .iter()
            .map(|e| extract_document(e, self.max_component_depth))
            .collect())
    }

    async fn load_by_ids(&self, ids: &[EntityId]) -> PlinthResult<Vec<IndexDocument>> {
        let entities = self.store.find(&|e: &T| ids.contains(&e.id())).await?;
        Ok(entities
            .iter()
            .map(|e| extract_document(e, self.max_component_depth))
            .collect())
    }

    async fn load_updated_since(
        &self,
        since: plinth_core::Timestamp,
    ) -> PlinthResult<Vec<IndexDocument>> {
        let entities = self.store.updated_since(since).await?;
        Ok(entities
            .iter()
            .map(|e| extract_document(e, self.max_component_depth))
            .collect())
    }
}

/// Outcome of one batched indexing pass.
struct PassOutcome {
    processed: u64,
    failed: u64,
    timed_out: bool,
}

/// Coordinates full and incremental index passes over every registered
/// source. Owns all writes to the search index.
pub struct IndexingCoordinator {
    sources: Vec<Arc<dyn IndexSource>>,
    index: Arc<dyn SearchIndexRepository>,
    jobs: Arc<dyn JobStore>,
    config: IndexingConfig,
    slot: Arc<ReindexSlot>,
}

impl IndexingCoordinator {
    pub fn new(
        index: Arc<dyn SearchIndexRepository>,
        jobs: Arc<dyn JobStore>,
        config: IndexingConfig,
    ) -> Self {
        Self {
            sources: Vec::new(),
            index,
            jobs,
            config,
            slot: Arc::new(ReindexSlot::new()),
        }
    }

    /// Register an entity source. Full reindexes walk sources in
    /// registration order.
    pub fn with_source(mut self, source: Arc<dyn IndexSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Whether a full reindex currently holds the single-flight slot.
    pub fn is_reindex_running(&self) -> bool {
        self.slot.is_running()
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Index all entities of one kind, or only `id_filter` when given and
    /// non-empty. Returns `Ok(false)` if any entity failed.
    pub async fn index_entities(
        &self,
        kind: EntityKind,
        id_filter: Option<&[EntityId]>,
    ) -> PlinthResult<bool> {
        let source = self.source_for(kind)?;
        let docs = match id_filter {
            Some(ids) if !ids.is_empty() => source.load_by_ids(ids).await?,
            _ => source.load_all().await?,
        };
        let total = docs.len();
        let outcome = self.index_documents(docs, None).await;
        tracing::info!(
            kind = %kind,
            total,
            processed = outcome.processed,
            failed = outcome.failed,
            "Indexed entities"
        );
        Ok(outcome.failed == 0)
    }

    /// Rebuild the whole index under the single-flight slot.
    ///
    /// Tombstones every live record up front so stale results disappear
    /// from search immediately; the cost is a brief window of fewer results
    /// until each kind is re-indexed, never stale-wrong ones. A concurrent
    /// caller fails fast with `Ok(false)`.
    pub async fn full_reindex(&self) -> PlinthResult<bool> {
        let _guard = match self.slot.try_acquire() {
            Some(guard) => guard,
            None => {
                tracing::warn!("Full reindex already running, refusing concurrent pass");
                return Ok(false);
            }
        };

        let mut job = IndexingJob::new(IndexingJobType::Full, Utc::now());
        self.jobs.create(job.clone()).await?;
        job.begin();
        self.persist_job(&job).await;
        tracing::info!(job_id = %job.job_id, "Full reindex started");

        let deadline = Instant::now() + self.config.reindex_timeout;
        let timed_out = match self.run_full_pass(&mut job, deadline).await {
            Ok(timed_out) => timed_out,
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "Full reindex failed");
                job.fail(e.to_string(), Utc::now());
                self.persist_job(&job).await;
                return Ok(false);
            }
        };

        if timed_out {
            job.fail(
                format!(
                    "reindex timed out after {}s",
                    self.config.reindex_timeout.as_secs()
                ),
                Utc::now(),
            );
        } else {
            job.finish(Utc::now());
        }
        self.persist_job(&job).await;

        tracing::info!(
            job_id = %job.job_id,
            status = %job.status,
            total = job.total_entities,
            processed = job.processed_entities,
            failed = job.failed_entities,
            "Full reindex finished"
        );
        Ok(job.status == IndexingJobStatus::Completed)
    }

    /// Re-index entities updated at or after `since` (default: one
    /// incremental window back). Not single-flight: incremental passes may
    /// overlap each other and a full reindex.
    pub async fn incremental_index(
        &self,
        since: Option<plinth_core::Timestamp>,
    ) -> PlinthResult<bool> {
        let window = chrono::Duration::from_std(self.config.incremental_window)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let since = since.unwrap_or_else(|| Utc::now() - window);

        let mut job = IndexingJob::new(IndexingJobType::Incremental, Utc::now());
        job.metadata.insert(
            "since".to_string(),
            ScalarValue::Text(since.to_rfc3339()),
        );
        self.jobs.create(job.clone()).await?;
        job.begin();
        self.persist_job(&job).await;

        // Load every source's changed entities in parallel.
        let loads = future::join_all(
            self.sources
                .iter()
                .map(|source| async move { (source.kind(), source.load_updated_since(since).await) }),
        )
        .await;

        let mut docs = Vec::new();
        for (kind, loaded) in loads {
            match loaded {
                Ok(mut kind_docs) => docs.append(&mut kind_docs),
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "Incremental load failed");
                    job.fail(format!("loading {} entities failed: {}", kind, e), Utc::now());
                    self.persist_job(&job).await;
                    return Ok(false);
                }
            }
        }

        job.total_entities = docs.len() as u64;
        let outcome = self.index_documents(docs, None).await;
        job.processed_entities = outcome.processed;
        job.failed_entities = outcome.failed;
        job.finish(Utc::now());
        self.persist_job(&job).await;

        tracing::info!(
            job_id = %job.job_id,
            since = %since,
            total = job.total_entities,
            failed = job.failed_entities,
            "Incremental index finished"
        );
        Ok(job.status == IndexingJobStatus::Completed)
    }

    /// Tombstone the index record for one entity. Idempotent: succeeds
    /// whether or not a live record existed.
    pub async fn remove_from_index(&self, kind: EntityKind, id: EntityId) -> PlinthResult<bool> {
        let removed = self.index.tombstone(kind, id).await?;
        if removed {
            tracing::debug!(kind = %kind, entity_id = %id, "Removed entity from index");
        }
        Ok(true)
    }

    /// One full pass body: sweep, rebuild per source, purge. Returns
    /// whether the deadline expired. Store errors bubble to the caller,
    /// which marks the job Failed.
    async fn run_full_pass(
        &self,
        job: &mut IndexingJob,
        deadline: Instant,
    ) -> PlinthResult<bool> {
        let swept = self.index.tombstone_all().await?;
        tracing::info!(swept, "Tombstoned live index ahead of rebuild");

        let mut timed_out = false;
        for source in &self.sources {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            let docs = source.load_all().await?;
            job.total_entities += docs.len() as u64;

            let outcome = self.index_documents(docs, Some(deadline)).await;
            job.processed_entities += outcome.processed;
            job.failed_entities += outcome.failed;
            // Progress is persisted after each entity-kind batch so an
            // interrupted job still shows how far it got.
            self.persist_job(job).await;

            if outcome.timed_out {
                timed_out = true;
                break;
            }
        }

        if !timed_out {
            let retention = chrono::Duration::from_std(self.config.tombstone_retention)
                .unwrap_or_else(|_| chrono::Duration::hours(24));
            match self.index.purge_tombstones(Utc::now() - retention).await {
                Ok(purged) if purged > 0 => {
                    tracing::info!(purged, "Purged expired tombstones");
                }
                Ok(_) => {}
                Err(e) => {
                    // Purge is hygiene, not correctness; the next pass
                    // retries it.
                    tracing::warn!(error = %e, "Tombstone purge failed");
                }
            }
        }
        Ok(timed_out)
    }

    /// Upsert documents in batches, honoring the deadline between batches.
    /// Per-document failures are logged and counted, never propagated.
    async fn index_documents(
        &self,
        docs: Vec<IndexDocument>,
        deadline: Option<Instant>,
    ) -> PassOutcome {
        let mut outcome = PassOutcome {
            processed: 0,
            failed: 0,
            timed_out: false,
        };

        for batch in docs.chunks(self.config.batch_size) {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    outcome.timed_out = true;
                    return outcome;
                }
            }

            if self.config.parallel {
                let results: Vec<(EntityKind, EntityId, PlinthResult<_>)> =
                    stream::iter(batch.to_vec())
                        .map(|doc| {
                            let index = Arc::clone(&self.index);
                            async move {
                                let identity = (doc.entity_kind, doc.entity_id);
                                let result = index.upsert(doc).await;
                                (identity.0, identity.1, result)
                            }
                        })
                        .buffer_unordered(self.config.parallelism)
                        .collect()
                        .await;
                for (kind, id, result) in results {
                    self.tally(&mut outcome, kind, id, result);
                }
            } else {
                for doc in batch {
                    let kind = doc.entity_kind;
                    let id = doc.entity_id;
                    let result = self.index.upsert(doc.clone()).await;
                    self.tally(&mut outcome, kind, id, result);
                }
            }
        }
        outcome
    }

    fn tally(
        &self,
        outcome: &mut PassOutcome,
        kind: EntityKind,
        id: EntityId,
        result: PlinthResult<plinth_core::SearchIndexRecord>,
    ) {
        match result {
            Ok(_) => outcome.processed += 1,
            Err(e) => {
                tracing::warn!(kind = %kind, entity_id = %id, error = %e, "Entity failed to index");
                outcome.failed += 1;
            }
        }
    }

    fn source_for(&self, kind: EntityKind) -> PlinthResult<&Arc<dyn IndexSource>> {
        self.sources
            .iter()
            .find(|s| s.kind() == kind)
            .ok_or_else(|| plinth_core::ConfigError::SourceNotRegistered { kind }.into())
    }

    async fn persist_job(&self, job: &IndexingJob) {
        if let Err(e) = self.jobs.update(job).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "Failed to persist job progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plinth_core::{new_entity_id, Page, StorageError, UserAccount};
    use plinth_storage::{InMemoryEntityStore, InMemoryJobStore, InMemorySearchIndex};
    use std::collections::HashMap;

    fn page(title: &str) -> Page {
        let now = Utc::now();
        Page {
            page_id: new_entity_id(),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            description: None,
            body: format!("<p>{} body</p>", title),
            is_published: true,
            components: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    fn user(name: &str) -> UserAccount {
        let now = Utc::now();
        UserAccount {
            user_id: new_entity_id(),
            display_name: name.to_string(),
            email: format!("{}@example.com", name),
            bio: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    struct Fixture {
        pages: Arc<InMemoryEntityStore<Page>>,
        users: Arc<InMemoryEntityStore<UserAccount>>,
        index: Arc<InMemorySearchIndex>,
        jobs: Arc<InMemoryJobStore>,
        coordinator: IndexingCoordinator,
    }

    fn fixture(config: IndexingConfig) -> Fixture {
        let pages = Arc::new(InMemoryEntityStore::new());
        let users = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let depth = config.max_component_depth;
        let coordinator = IndexingCoordinator::new(
            Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            config,
        )
        .with_source(Arc::new(EntitySourceAdapter::<_, Page>::new(
            Arc::clone(&pages),
            depth,
        )))
        .with_source(Arc::new(EntitySourceAdapter::<_, UserAccount>::new(
            Arc::clone(&users),
            depth,
        )));
        Fixture {
            pages,
            users,
            index,
            jobs,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_index_entities_upserts_one_record_each() {
        let f = fixture(IndexingConfig::default());
        f.pages.add(page("Home")).await.unwrap();
        f.pages.add(page("About")).await.unwrap();

        assert!(f.coordinator.index_entities(EntityKind::Page, None).await.unwrap());
        assert_eq!(f.index.live_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_index_entities_with_id_filter() {
        let f = fixture(IndexingConfig::default());
        let keep = f.pages.add(page("Keep")).await.unwrap();
        f.pages.add(page("Skip")).await.unwrap();

        assert!(f
            .coordinator
            .index_entities(EntityKind::Page, Some(&[keep.page_id]))
            .await
            .unwrap());
        assert_eq!(f.index.live_count().await.unwrap(), 1);
        assert!(f
            .index
            .get_live(EntityKind::Page, keep.page_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_index_entities_unregistered_kind_is_config_error() {
        let f = fixture(IndexingConfig::default());
        let err = f
            .coordinator
            .index_entities(EntityKind::File, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            plinth_core::PlinthError::Config(plinth_core::ConfigError::SourceNotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeated_indexing_keeps_one_live_record() {
        let f = fixture(IndexingConfig::default());
        let p = f.pages.add(page("Home")).await.unwrap();

        let mut last_indexed = None;
        for _ in 0..5 {
            assert!(f.coordinator.index_entities(EntityKind::Page, None).await.unwrap());
            let record = f
                .index
                .get_live(EntityKind::Page, p.page_id)
                .await
                .unwrap()
                .unwrap();
            if let Some(previous) = last_indexed {
                assert!(record.last_indexed_at >= previous);
            }
            last_indexed = Some(record.last_indexed_at);
        }
        assert_eq!(f.index.live_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_reindex_completes_and_bookkeeps() {
        let f = fixture(IndexingConfig::default());
        f.pages.add(page("Home")).await.unwrap();
        f.pages.add(page("About")).await.unwrap();
        f.users.add(user("ada")).await.unwrap();

        assert!(f.coordinator.full_reindex().await.unwrap());
        assert_eq!(f.index.live_count().await.unwrap(), 3);

        let recent = f.jobs.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        let job = &recent[0];
        assert_eq!(job.job_type, IndexingJobType::Full);
        assert_eq!(job.status, IndexingJobStatus::Completed);
        assert_eq!(job.total_entities, 3);
        assert_eq!(job.processed_entities, 3);
        assert_eq!(job.failed_entities, 0);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_full_reindex_replaces_stale_records() {
        let f = fixture(IndexingConfig::default());
        let mut p = f.pages.add(page("Old Title")).await.unwrap();
        f.coordinator.index_entities(EntityKind::Page, None).await.unwrap();

        p.title = "New Title".to_string();
        p.updated_at = Utc::now();
        f.pages.update(p.clone()).await.unwrap();

        assert!(f.coordinator.full_reindex().await.unwrap());
        let record = f
            .index
            .get_live(EntityKind::Page, p.page_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "New Title");
        assert_eq!(f.index.live_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incremental_index_only_touches_updated_entities() {
        let f = fixture(IndexingConfig::default());
        let mut stale = page("Stale");
        stale.updated_at = Utc::now() - chrono::Duration::hours(3);
        f.pages.add(stale.clone()).await.unwrap();
        let fresh = f.pages.add(page("Fresh")).await.unwrap();

        assert!(f.coordinator.incremental_index(None).await.unwrap());

        assert!(f
            .index
            .get_live(EntityKind::Page, fresh.page_id)
            .await
            .unwrap()
            .is_some());
        assert!(f
            .index
            .get_live(EntityKind::Page, stale.page_id)
            .await
            .unwrap()
            .is_none());

        let job = &f.jobs.recent(1).await.unwrap()[0];
        assert_eq!(job.job_type, IndexingJobType::Incremental);
        assert_eq!(job.status, IndexingJobStatus::Completed);
        assert_eq!(job.total_entities, 1);
    }

    #[tokio::test]
    async fn test_incremental_with_explicit_watermark() {
        let f = fixture(IndexingConfig::default());
        let mut old = page("Old");
        old.updated_at = Utc::now() - chrono::Duration::hours(3);
        f.pages.add(old).await.unwrap();
        f.pages.add(page("New")).await.unwrap();

        let since = Utc::now() - chrono::Duration::hours(4);
        assert!(f.coordinator.incremental_index(Some(since)).await.unwrap());
        assert_eq!(f.index.live_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_from_index_is_idempotent() {
        let f = fixture(IndexingConfig::default());
        let p = f.pages.add(page("Home")).await.unwrap();
        f.coordinator.index_entities(EntityKind::Page, None).await.unwrap();

        assert!(f
            .coordinator
            .remove_from_index(EntityKind::Page, p.page_id)
            .await
            .unwrap());
        assert_eq!(f.index.live_count().await.unwrap(), 0);
        // Absent record: still a success.
        assert!(f
            .coordinator
            .remove_from_index(EntityKind::Page, p.page_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_parallel_mode_indexes_everything() {
        let f = fixture(IndexingConfig::default().with_parallel(true).with_batch_size(4));
        for i in 0..25 {
            f.pages.add(page(&format!("Page {}", i))).await.unwrap();
        }
        assert!(f.coordinator.full_reindex().await.unwrap());
        assert_eq!(f.index.live_count().await.unwrap(), 25);
    }

    // Index repository that fails every upsert for a chosen kind; exercises
    // partial-failure accounting.
    struct FlakyIndex {
        inner: InMemorySearchIndex,
        fail_kind: EntityKind,
    }

    #[async_trait]
    impl SearchIndexRepository for FlakyIndex {
        async fn upsert(&self, doc: IndexDocument) -> PlinthResult<plinth_core::SearchIndexRecord> {
            if doc.entity_kind == self.fail_kind {
                return Err(StorageError::QueryFailed {
                    reason: "simulated upsert failure".to_string(),
                }
                .into());
            }
            self.inner.upsert(doc).await
        }

        async fn get_live(
            &self,
            kind: EntityKind,
            entity_id: EntityId,
        ) -> PlinthResult<Option<plinth_core::SearchIndexRecord>> {
            self.inner.get_live(kind, entity_id).await
        }

        async fn live_records(&self) -> PlinthResult<Vec<plinth_core::SearchIndexRecord>> {
            self.inner.live_records().await
        }

        async fn live_count(&self) -> PlinthResult<u64> {
            self.inner.live_count().await
        }

        async fn tombstone(&self, kind: EntityKind, entity_id: EntityId) -> PlinthResult<bool> {
            self.inner.tombstone(kind, entity_id).await
        }

        async fn tombstone_all(&self) -> PlinthResult<u64> {
            self.inner.tombstone_all().await
        }

        async fn purge_tombstones(
            &self,
            older_than: plinth_core::Timestamp,
        ) -> PlinthResult<u64> {
            self.inner.purge_tombstones(older_than).await
        }
    }

    #[tokio::test]
    async fn test_per_entity_failures_fail_job_but_not_pass() {
        let pages = Arc::new(InMemoryEntityStore::new());
        let users = Arc::new(InMemoryEntityStore::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let index = Arc::new(FlakyIndex {
            inner: InMemorySearchIndex::new(),
            fail_kind: EntityKind::User,
        });
        let coordinator = IndexingCoordinator::new(
            Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            IndexingConfig::default(),
        )
        .with_source(Arc::new(EntitySourceAdapter::<_, Page>::new(
            Arc::clone(&pages),
            16,
        )))
        .with_source(Arc::new(EntitySourceAdapter::<_, UserAccount>::new(
            Arc::clone(&users),
            16,
        )));

        pages.add(page("Home")).await.unwrap();
        users.add(user("ada")).await.unwrap();
        users.add(user("bob")).await.unwrap();

        // The pass finishes despite per-entity failures, and reports them.
        assert!(!coordinator.full_reindex().await.unwrap());

        let job = &jobs.recent(1).await.unwrap()[0];
        assert_eq!(job.status, IndexingJobStatus::Failed);
        assert_eq!(job.total_entities, 3);
        assert_eq!(job.processed_entities, 1);
        assert_eq!(job.failed_entities, 2);
        assert!(job.error_message.as_deref().unwrap().contains("2 of 3"));
        // The page still made it into the index.
        assert_eq!(index.inner.live_count().await.unwrap(), 1);
    }
}
