//! PLINTH Storage - Stores and Cache Coordination
//!
//! Storage abstraction for the content platform: async store traits
//! (entities, search index, indexing jobs, cache), in-memory backends used
//! by tests and embedding hosts, structured cache keys with glob-pattern
//! invalidation, and the write-through cached entity store.
//!
//! The durable store and the cache are external collaborators as far as the
//! platform core is concerned; everything here is the seam they plug into.

pub mod cache;
pub mod index_repo;
pub mod jobs;
pub mod store;

pub use cache::cached_store::CachedEntityStore;
pub use cache::invalidation::CacheInvalidationCoordinator;
pub use cache::keys::{CacheKey, KeyPattern};
pub use cache::memory::InMemoryCacheStore;
pub use cache::traits::{get_or_add, CacheConfig, CacheStats, CacheStore};
pub use index_repo::{InMemorySearchIndex, SearchIndexRepository};
pub use jobs::{InMemoryJobStore, JobStore};
pub use store::{EntityPredicate, EntityStore, InMemoryEntityStore};
