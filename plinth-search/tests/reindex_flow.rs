//! End-to-end indexing flow tests: single-flight enforcement, the
//! tombstone-before-refill ordering of a full reindex, and search over a
//! freshly rebuilt index.

use async_trait::async_trait;
use plinth_core::{EntityId, EntityKind, IndexDocument, IndexingJobStatus, PlinthResult, Timestamp};
use plinth_search::{
    EntitySourceAdapter, IndexSource, IndexingConfig, IndexingCoordinator, SearchConfig,
    SearchQueryEngine, SearchRequest,
};
use plinth_storage::{
    CacheStore, EntityStore, InMemoryCacheStore, InMemoryEntityStore, InMemoryJobStore,
    InMemorySearchIndex, JobStore, SearchIndexRepository,
};
use plinth_test_utils::{fixtures, init_test_tracing};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Source that parks inside `load_all` until released, so tests can observe
/// a reindex mid-flight.
struct GatedSource {
    docs: Vec<IndexDocument>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl IndexSource for GatedSource {
    fn kind(&self) -> EntityKind {
        EntityKind::Page
    }

    async fn load_all(&self) -> PlinthResult<Vec<IndexDocument>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.docs.clone())
    }

    async fn load_by_ids(&self, _ids: &[EntityId]) -> PlinthResult<Vec<IndexDocument>> {
        Ok(Vec::new())
    }

    async fn load_updated_since(&self, _since: Timestamp) -> PlinthResult<Vec<IndexDocument>> {
        Ok(Vec::new())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_full_reindex_fails_fast() {
    init_test_tracing();

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = Arc::new(GatedSource {
        docs: vec![fixtures::sample_document(
            EntityKind::Page,
            "Home",
            "welcome home",
        )],
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    });

    let index = Arc::new(InMemorySearchIndex::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let coordinator = Arc::new(
        IndexingCoordinator::new(
            Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            IndexingConfig::default(),
        )
        .with_source(source),
    );

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.full_reindex().await })
    };

    // Wait until the first pass is parked inside its source load.
    entered.notified().await;
    assert!(coordinator.is_reindex_running());

    // A concurrent pass refuses immediately rather than queueing.
    assert!(!coordinator.full_reindex().await.unwrap());

    release.notify_one();
    assert!(first.await.unwrap().unwrap());
    assert!(!coordinator.is_reindex_running());

    // Exactly one job ran to completion; the refused pass left no record.
    let recent = jobs.recent(10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].status, IndexingJobStatus::Completed);
    assert_eq!(index.live_count().await.unwrap(), 1);
}

/// Source that records the live index count when it is asked to load, to
/// observe the index state partway through a full reindex.
struct ProbeSource {
    docs: Vec<IndexDocument>,
    index: Arc<InMemorySearchIndex>,
    observed_counts: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl IndexSource for ProbeSource {
    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    async fn load_all(&self) -> PlinthResult<Vec<IndexDocument>> {
        let count = self.index.live_count().await?;
        self.observed_counts.lock().unwrap().push(count);
        Ok(self.docs.clone())
    }

    async fn load_by_ids(&self, _ids: &[EntityId]) -> PlinthResult<Vec<IndexDocument>> {
        Ok(Vec::new())
    }

    async fn load_updated_since(&self, _since: Timestamp) -> PlinthResult<Vec<IndexDocument>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn full_reindex_tombstones_before_refilling() {
    init_test_tracing();

    let pages = Arc::new(InMemoryEntityStore::new());
    for title in ["Alpha", "Beta", "Gamma"] {
        pages.add(fixtures::sample_page(title)).await.unwrap();
    }

    let index = Arc::new(InMemorySearchIndex::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let observed_counts = Arc::new(Mutex::new(Vec::new()));
    let probe = Arc::new(ProbeSource {
        docs: vec![
            fixtures::sample_document(EntityKind::User, "Ada", "ada profile"),
            fixtures::sample_document(EntityKind::User, "Bob", "bob profile"),
        ],
        index: Arc::clone(&index),
        observed_counts: Arc::clone(&observed_counts),
    });

    let coordinator = IndexingCoordinator::new(
        Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
        Arc::clone(&jobs) as Arc<dyn JobStore>,
        IndexingConfig::default(),
    )
    .with_source(Arc::new(EntitySourceAdapter::<_, plinth_core::Page>::new(
        Arc::clone(&pages),
        16,
    )))
    .with_source(probe);

    // First pass populates all five records.
    assert!(coordinator.full_reindex().await.unwrap());
    assert_eq!(index.live_count().await.unwrap(), 5);

    // Second pass: when the probe source loads, the whole index has been
    // tombstoned and only the pages (processed before it) are live again.
    // Were the sweep deferred, the probe would still see its own two
    // records from the first pass and observe 5.
    assert!(coordinator.full_reindex().await.unwrap());
    let counts = observed_counts.lock().unwrap().clone();
    assert_eq!(counts, vec![3, 3]);
    assert_eq!(index.live_count().await.unwrap(), 5);
}

#[tokio::test]
async fn search_reflects_rebuilt_index() {
    init_test_tracing();

    let pages = Arc::new(InMemoryEntityStore::new());
    let launch = pages
        .add(fixtures::sample_page("Product Launch"))
        .await
        .unwrap();
    pages.add(fixtures::sample_page("Pricing")).await.unwrap();

    let index = Arc::new(InMemorySearchIndex::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let coordinator = IndexingCoordinator::new(
        Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
        Arc::clone(&jobs) as Arc<dyn JobStore>,
        IndexingConfig::default(),
    )
    .with_source(Arc::new(EntitySourceAdapter::<_, plinth_core::Page>::new(
        Arc::clone(&pages),
        16,
    )));
    assert!(coordinator.full_reindex().await.unwrap());

    let cache = Arc::new(InMemoryCacheStore::new());
    let engine = SearchQueryEngine::new(
        Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
        Arc::clone(&jobs) as Arc<dyn JobStore>,
        Arc::clone(&cache) as Arc<dyn CacheStore>,
        SearchConfig::default(),
    );

    let response = engine.search(&SearchRequest::new("product launch")).await;
    assert_eq!(response.total_results, 1);
    assert_eq!(response.results[0].entity_id, launch.page_id);

    let status = engine.indexing_status().await;
    assert_eq!(status.live_records, 2);
    assert!(status.last_full_completed_at.is_some());

    // Removal is reflected once the cached response is bypassed by a new
    // query shape.
    coordinator
        .remove_from_index(EntityKind::Page, launch.page_id)
        .await
        .unwrap();
    let narrowed = engine
        .search(&SearchRequest::new("product launch").with_kinds(vec![EntityKind::Page]))
        .await;
    assert_eq!(narrowed.total_results, 0);
}

#[tokio::test]
async fn full_reindex_times_out_and_fails_job() {
    init_test_tracing();

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = Arc::new(GatedSource {
        docs: vec![fixtures::sample_document(
            EntityKind::Page,
            "Slow",
            "slow content",
        )],
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    });

    let index = Arc::new(InMemorySearchIndex::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let config = IndexingConfig::default().with_reindex_timeout(Duration::from_millis(50));
    let coordinator = Arc::new(
        IndexingCoordinator::new(
            Arc::clone(&index) as Arc<dyn SearchIndexRepository>,
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            config,
        )
        .with_source(source),
    );

    let pass = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.full_reindex().await })
    };

    entered.notified().await;
    // Hold the source past the deadline before letting it return.
    tokio::time::sleep(Duration::from_millis(80)).await;
    release.notify_one();

    assert!(!pass.await.unwrap().unwrap());
    let job = &jobs.recent(1).await.unwrap()[0];
    assert_eq!(job.status, IndexingJobStatus::Failed);
    assert!(job.error_message.as_deref().unwrap().contains("timed out"));
    // The slot is free again after the timeout.
    assert!(!coordinator.is_reindex_running());
}
