//! Configuration for indexing and search.

use plinth_core::{ConfigError, PlinthResult};
use std::time::Duration;

/// Default entities per index batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default full-reindex timeout (60 minutes).
pub const DEFAULT_REINDEX_TIMEOUT_SECS: u64 = 3600;
/// Default incremental window when no watermark is given (1 hour).
pub const DEFAULT_INCREMENTAL_WINDOW_SECS: u64 = 3600;
/// Default tombstone retention before physical purge (24 hours).
pub const DEFAULT_TOMBSTONE_RETENTION_SECS: u64 = 86_400;
/// Default component tree depth limit for extraction.
pub const DEFAULT_MAX_COMPONENT_DEPTH: usize = 16;

/// Default TTL for cached search responses (5 minutes).
pub const DEFAULT_SEARCH_CACHE_TTL_SECS: u64 = 300;
/// Default TTL for cached suggestions (10 minutes).
pub const DEFAULT_SUGGEST_CACHE_TTL_SECS: u64 = 600;
/// Default TTL for the cached indexing status (2 minutes).
pub const DEFAULT_STATUS_CACHE_TTL_SECS: u64 = 120;
/// Default page size when a request passes 0.
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Hard page-size ceiling.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
/// Target excerpt length in characters, before ellipsis markers.
pub const DEFAULT_EXCERPT_LENGTH: usize = 200;
/// Default maximum suggestions per query.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;
/// Minimum query length before suggest touches the store.
pub const DEFAULT_MIN_SUGGEST_LEN: usize = 2;

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Configuration for the indexing coordinator.
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// Entities upserted per batch; bounds memory and transaction size.
    pub batch_size: usize,

    /// Fan batches out across a bounded worker pool.
    ///
    /// Sequential mode is deterministic; parallel mode does not guarantee
    /// the ordering of partial failures.
    pub parallel: bool,

    /// Worker-pool width in parallel mode (default: available parallelism).
    pub parallelism: usize,

    /// Deadline for a full reindex; checked between batches. In-flight work
    /// finishes, nothing new is dispatched past it.
    pub reindex_timeout: Duration,

    /// Lookback window for incremental passes without an explicit watermark.
    pub incremental_window: Duration,

    /// How long tombstones are retained before physical purge.
    pub tombstone_retention: Duration,

    /// Depth limit for page component tree extraction.
    pub max_component_depth: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
            parallelism: available_parallelism(),
            reindex_timeout: Duration::from_secs(DEFAULT_REINDEX_TIMEOUT_SECS),
            incremental_window: Duration::from_secs(DEFAULT_INCREMENTAL_WINDOW_SECS),
            tombstone_retention: Duration::from_secs(DEFAULT_TOMBSTONE_RETENTION_SECS),
            max_component_depth: DEFAULT_MAX_COMPONENT_DEPTH,
        }
    }
}

impl IndexingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Environment Variables
    /// - `PLINTH_INDEX_BATCH_SIZE`: entities per batch (default: 100)
    /// - `PLINTH_INDEX_PARALLEL`: enable parallel mode (default: false)
    /// - `PLINTH_INDEX_REINDEX_TIMEOUT_SECS`: full-reindex deadline (default: 3600)
    /// - `PLINTH_INDEX_INCREMENTAL_WINDOW_SECS`: default lookback (default: 3600)
    /// - `PLINTH_INDEX_TOMBSTONE_RETENTION_SECS`: tombstone retention (default: 86400)
    /// - `PLINTH_INDEX_MAX_COMPONENT_DEPTH`: component tree depth limit (default: 16)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_parse("PLINTH_INDEX_BATCH_SIZE", defaults.batch_size),
            parallel: std::env::var("PLINTH_INDEX_PARALLEL")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            parallelism: defaults.parallelism,
            reindex_timeout: Duration::from_secs(env_parse(
                "PLINTH_INDEX_REINDEX_TIMEOUT_SECS",
                DEFAULT_REINDEX_TIMEOUT_SECS,
            )),
            incremental_window: Duration::from_secs(env_parse(
                "PLINTH_INDEX_INCREMENTAL_WINDOW_SECS",
                DEFAULT_INCREMENTAL_WINDOW_SECS,
            )),
            tombstone_retention: Duration::from_secs(env_parse(
                "PLINTH_INDEX_TOMBSTONE_RETENTION_SECS",
                DEFAULT_TOMBSTONE_RETENTION_SECS,
            )),
            max_component_depth: env_parse(
                "PLINTH_INDEX_MAX_COMPONENT_DEPTH",
                DEFAULT_MAX_COMPONENT_DEPTH,
            ),
        }
    }

    /// Create a configuration for development/testing with small batches
    /// and a short deadline.
    pub fn development() -> Self {
        Self {
            batch_size: 10,
            reindex_timeout: Duration::from_secs(60),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_reindex_timeout(mut self, timeout: Duration) -> Self {
        self.reindex_timeout = timeout;
        self
    }

    pub fn with_tombstone_retention(mut self, retention: Duration) -> Self {
        self.tombstone_retention = retention;
        self
    }

    pub fn validate(&self) -> PlinthResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parallelism".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.max_component_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_component_depth".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Configuration for the search query engine.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub search_cache_ttl: Duration,
    pub suggest_cache_ttl: Duration,
    pub status_cache_ttl: Duration,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub excerpt_length: usize,
    pub max_suggestions: usize,
    pub min_suggest_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_cache_ttl: Duration::from_secs(DEFAULT_SEARCH_CACHE_TTL_SECS),
            suggest_cache_ttl: Duration::from_secs(DEFAULT_SUGGEST_CACHE_TTL_SECS),
            status_cache_ttl: Duration::from_secs(DEFAULT_STATUS_CACHE_TTL_SECS),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            excerpt_length: DEFAULT_EXCERPT_LENGTH,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            min_suggest_len: DEFAULT_MIN_SUGGEST_LEN,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Environment Variables
    /// - `PLINTH_SEARCH_CACHE_TTL_SECS`: search response TTL (default: 300)
    /// - `PLINTH_SEARCH_SUGGEST_CACHE_TTL_SECS`: suggestion TTL (default: 600)
    /// - `PLINTH_SEARCH_STATUS_CACHE_TTL_SECS`: status TTL (default: 120)
    /// - `PLINTH_SEARCH_DEFAULT_PAGE_SIZE`: fallback page size (default: 20)
    /// - `PLINTH_SEARCH_MAX_PAGE_SIZE`: page size ceiling (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            search_cache_ttl: Duration::from_secs(env_parse(
                "PLINTH_SEARCH_CACHE_TTL_SECS",
                DEFAULT_SEARCH_CACHE_TTL_SECS,
            )),
            suggest_cache_ttl: Duration::from_secs(env_parse(
                "PLINTH_SEARCH_SUGGEST_CACHE_TTL_SECS",
                DEFAULT_SUGGEST_CACHE_TTL_SECS,
            )),
            status_cache_ttl: Duration::from_secs(env_parse(
                "PLINTH_SEARCH_STATUS_CACHE_TTL_SECS",
                DEFAULT_STATUS_CACHE_TTL_SECS,
            )),
            default_page_size: env_parse(
                "PLINTH_SEARCH_DEFAULT_PAGE_SIZE",
                DEFAULT_PAGE_SIZE,
            ),
            max_page_size: env_parse("PLINTH_SEARCH_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE),
            ..defaults
        }
    }

    pub fn validate(&self) -> PlinthResult<()> {
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size".to_string(),
                value: self.default_page_size.to_string(),
                reason: format!("must be between 1 and {}", self.max_page_size),
            }
            .into());
        }
        if self.excerpt_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "excerpt_length".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
