//! Cache coordination: structured keys, the store trait, the in-memory
//! backend, pattern-based invalidation, and the write-through entity store.

pub mod cached_store;
pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod traits;

pub use cached_store::CachedEntityStore;
pub use invalidation::CacheInvalidationCoordinator;
pub use keys::{CacheKey, KeyPattern};
pub use memory::InMemoryCacheStore;
pub use traits::{get_or_add, CacheConfig, CacheStats, CacheStore};
