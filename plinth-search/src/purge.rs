//! Tombstone Purge Background Task
//!
//! Removal from the index is a soft delete: records are tombstoned so a
//! crashed reindex never loses track of what used to exist. This task
//! physically deletes tombstones once they are older than the retention
//! window. Full reindexes also purge opportunistically at the end of a
//! successful pass; this task covers deployments where full reindexes are
//! rare.
//!
//! The task runs until the shutdown signal is received and returns its
//! metrics so the host can log or export final counts.

use plinth_storage::SearchIndexRepository;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Default interval between purge cycles (1 hour).
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;
/// Default tombstone retention before physical deletion (24 hours).
pub const DEFAULT_PURGE_RETENTION_SECS: u64 = 86_400;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the tombstone purge background task.
#[derive(Debug, Clone)]
pub struct TombstonePurgeConfig {
    /// How often to run a purge cycle (default: 1 hour)
    pub purge_interval: Duration,

    /// Tombstones older than this are physically deleted (default: 24 hours)
    pub retention: Duration,
}

impl Default for TombstonePurgeConfig {
    fn default() -> Self {
        Self {
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
            retention: Duration::from_secs(DEFAULT_PURGE_RETENTION_SECS),
        }
    }
}

impl TombstonePurgeConfig {
    /// Create TombstonePurgeConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PLINTH_PURGE_INTERVAL_SECS`: interval between purge cycles (default: 3600)
    /// - `PLINTH_PURGE_RETENTION_SECS`: tombstone retention (default: 86400)
    pub fn from_env() -> Self {
        let purge_interval = Duration::from_secs(
            std::env::var("PLINTH_PURGE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PURGE_INTERVAL_SECS),
        );

        let retention = Duration::from_secs(
            std::env::var("PLINTH_PURGE_RETENTION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PURGE_RETENTION_SECS),
        );

        Self {
            purge_interval,
            retention,
        }
    }

    /// Create a configuration for development/testing with short cycles.
    pub fn development() -> Self {
        Self {
            purge_interval: Duration::from_secs(10),
            retention: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Metrics for tombstone purge operations.
#[derive(Debug, Default)]
pub struct TombstonePurgeMetrics {
    /// Total tombstones physically deleted since startup
    pub tombstones_purged: AtomicU64,

    /// Total purge cycles completed
    pub purge_cycles: AtomicU64,

    /// Total errors encountered during purge
    pub purge_errors: AtomicU64,
}

impl TombstonePurgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> TombstonePurgeSnapshot {
        TombstonePurgeSnapshot {
            tombstones_purged: self.tombstones_purged.load(Ordering::Relaxed),
            purge_cycles: self.purge_cycles.load(Ordering::Relaxed),
            purge_errors: self.purge_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of purge metrics at a point in time.
#[derive(Debug, Clone)]
pub struct TombstonePurgeSnapshot {
    pub tombstones_purged: u64,
    pub purge_cycles: u64,
    pub purge_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically purges expired tombstones.
///
/// # Arguments
///
/// * `index` - Search index repository to purge
/// * `config` - Purge configuration (interval, retention)
/// * `shutdown_rx` - Watch receiver for shutdown signal
///
/// # Returns
///
/// Metrics collected during the task's lifetime
///
/// # Example
///
/// ```ignore
/// use tokio::sync::watch;
/// use std::sync::Arc;
///
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let config = TombstonePurgeConfig::default();
///
/// let handle = tokio::spawn(async move {
///     tombstone_purge_task(index, config, shutdown_rx).await
/// });
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await.unwrap();
/// ```
pub async fn tombstone_purge_task(
    index: Arc<dyn SearchIndexRepository>,
    config: TombstonePurgeConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<TombstonePurgeMetrics> {
    let metrics = Arc::new(TombstonePurgeMetrics::new());

    let mut purge_interval = interval(config.purge_interval);
    purge_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        purge_interval_secs = config.purge_interval.as_secs(),
        retention_secs = config.retention.as_secs(),
        "Tombstone purge task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Tombstone purge task shutting down");
                    break;
                }
            }

            _ = purge_interval.tick() => {
                purge_cycle(index.as_ref(), &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        tombstones_purged = snapshot.tombstones_purged,
        purge_cycles = snapshot.purge_cycles,
        purge_errors = snapshot.purge_errors,
        "Tombstone purge task completed"
    );

    metrics
}

/// Perform one purge cycle.
async fn purge_cycle(
    index: &dyn SearchIndexRepository,
    config: &TombstonePurgeConfig,
    metrics: &TombstonePurgeMetrics,
) {
    metrics.purge_cycles.fetch_add(1, Ordering::Relaxed);

    let retention = chrono::Duration::from_std(config.retention)
        .unwrap_or_else(|_| chrono::Duration::hours(24));
    let cutoff = chrono::Utc::now() - retention;

    match index.purge_tombstones(cutoff).await {
        Ok(purged) => {
            if purged > 0 {
                tracing::info!(purged, "Purged expired tombstones");
                metrics.tombstones_purged.fetch_add(purged, Ordering::Relaxed);
            } else {
                tracing::trace!("Purge cycle completed with no expired tombstones");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Tombstone purge cycle failed");
            metrics.purge_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::{new_entity_id, EntityKind, IndexDocument};
    use plinth_storage::InMemorySearchIndex;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = TombstonePurgeConfig::default();
        assert_eq!(
            config.purge_interval,
            Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS)
        );
        assert_eq!(
            config.retention,
            Duration::from_secs(DEFAULT_PURGE_RETENTION_SECS)
        );
    }

    #[test]
    fn test_config_development() {
        let config = TombstonePurgeConfig::development();
        assert_eq!(config.purge_interval, Duration::from_secs(10));
        assert_eq!(config.retention, Duration::from_secs(60));
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = TombstonePurgeMetrics::new();
        metrics.tombstones_purged.store(7, Ordering::Relaxed);
        metrics.purge_cycles.store(3, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tombstones_purged, 7);
        assert_eq!(snapshot.purge_cycles, 3);
        assert_eq!(snapshot.purge_errors, 0);
    }

    fn doc() -> IndexDocument {
        IndexDocument {
            entity_kind: EntityKind::Page,
            entity_id: new_entity_id(),
            title: "Title".to_string(),
            content: "Content".to_string(),
            search_vector: "title content".to_string(),
            is_public: true,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_purge_cycle_removes_expired_tombstones_only() {
        let index = InMemorySearchIndex::new();
        let live = index.upsert(doc()).await.unwrap();
        let dead = index.upsert(doc()).await.unwrap();
        index
            .tombstone(dead.entity_kind, dead.entity_id)
            .await
            .unwrap();

        let metrics = TombstonePurgeMetrics::new();
        // Zero retention: the fresh tombstone is already past the cutoff.
        let config = TombstonePurgeConfig {
            retention: Duration::from_secs(0),
            ..TombstonePurgeConfig::default()
        };

        // The fresh tombstone's deleted_at must fall behind the cutoff.
        tokio::time::sleep(Duration::from_millis(5)).await;
        purge_cycle(&index, &config, &metrics).await;

        assert_eq!(metrics.snapshot().tombstones_purged, 1);
        assert_eq!(metrics.snapshot().purge_cycles, 1);
        assert!(index
            .get_live(live.entity_kind, live.entity_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_purge_cycle_respects_retention() {
        let index = InMemorySearchIndex::new();
        let dead = index.upsert(doc()).await.unwrap();
        index
            .tombstone(dead.entity_kind, dead.entity_id)
            .await
            .unwrap();

        let metrics = TombstonePurgeMetrics::new();
        let config = TombstonePurgeConfig::default();
        purge_cycle(&index, &config, &metrics).await;

        // Tombstone is minutes old, retention is a day: nothing purged.
        assert_eq!(metrics.snapshot().tombstones_purged, 0);
        assert_eq!(metrics.snapshot().purge_cycles, 1);
    }

    #[tokio::test]
    async fn test_task_shuts_down_on_signal() {
        let index: Arc<dyn SearchIndexRepository> = Arc::new(InMemorySearchIndex::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(tombstone_purge_task(
            index,
            TombstonePurgeConfig::default(),
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();
        // The first interval tick fires immediately, so at most one cycle ran.
        assert!(metrics.snapshot().purge_cycles <= 1);
    }
}
