//! PLINTH Search - Indexing and Query
//!
//! The search half of the platform core: per-kind content extraction into
//! a denormalized index, the indexing coordinator (full and incremental
//! passes with job bookkeeping, single-flight enforcement, and tombstone
//! hygiene), the ranked query engine with result caching, and the periodic
//! tombstone purge task.

pub mod config;
pub mod coordinator;
pub mod extract;
pub mod purge;
pub mod query;
pub mod single_flight;

pub use config::{IndexingConfig, SearchConfig};
pub use coordinator::{EntitySourceAdapter, IndexSource, IndexingCoordinator};
pub use extract::{extract_document, Indexable};
pub use purge::{
    tombstone_purge_task, TombstonePurgeConfig, TombstonePurgeMetrics, TombstonePurgeSnapshot,
};
pub use query::{
    IndexingStatus, SearchHit, SearchQueryEngine, SearchRequest, SearchResponse, Suggestion,
};
pub use single_flight::{ReindexGuard, ReindexSlot};
