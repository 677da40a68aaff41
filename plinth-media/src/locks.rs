//! Per-content-hash upload locks and their periodic sweep.
//!
//! The hash→lock map serializes concurrent uploads of byte-identical
//! content: exactly one caller per hash performs the duplicate check and
//! write, the rest wait and observe the winner's record. The keyspace is
//! unbounded (one entry per distinct hash ever uploaded), so a background
//! sweep discards locks that are no longer held or shared.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// Default interval between lock sweeps (10 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;
/// Default cap on removals per sweep, bounding pause time.
pub const DEFAULT_MAX_REMOVALS_PER_SWEEP: usize = 256;

/// Process-wide map from content hash to its upload lock.
///
/// Entries are created on first use with an atomic get-or-insert; callers
/// lock via `lock_owned` so the guard keeps the `Arc` alive, which is what
/// the sweep's liveness check relies on.
#[derive(Debug, Default)]
pub struct HashLockMap {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl HashLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a content hash, created on first reference.
    pub fn lock_for(&self, hash: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(hash.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of locks currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Discard idle locks, up to `max_removals`.
    ///
    /// A lock is idle when the map holds the only `Arc` reference and the
    /// mutex is currently free; a held or shared lock is never removed, so
    /// an in-flight upload always keeps its lock.
    pub fn sweep(&self, max_removals: usize) -> u64 {
        let mut removed = 0u64;
        self.locks.retain(|_, lock| {
            if removed as usize >= max_removals {
                return true;
            }
            let idle = Arc::strong_count(lock) == 1 && lock.try_lock().is_ok();
            if idle {
                removed += 1;
            }
            !idle
        });
        removed
    }
}

// ============================================================================
// SWEEP CONFIGURATION AND METRICS
// ============================================================================

/// Configuration for the lock sweep background task.
#[derive(Debug, Clone)]
pub struct LockSweepConfig {
    /// How often to sweep idle locks (default: 10 minutes)
    pub sweep_interval: Duration,

    /// Maximum locks removed per sweep (default: 256)
    pub max_removals_per_sweep: usize,
}

impl Default for LockSweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            max_removals_per_sweep: DEFAULT_MAX_REMOVALS_PER_SWEEP,
        }
    }
}

impl LockSweepConfig {
    /// Create LockSweepConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PLINTH_LOCK_SWEEP_INTERVAL_SECS`: interval between sweeps (default: 600)
    /// - `PLINTH_LOCK_SWEEP_MAX_REMOVALS`: removal cap per sweep (default: 256)
    pub fn from_env() -> Self {
        let sweep_interval = Duration::from_secs(
            std::env::var("PLINTH_LOCK_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );

        let max_removals_per_sweep = std::env::var("PLINTH_LOCK_SWEEP_MAX_REMOVALS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_REMOVALS_PER_SWEEP);

        Self {
            sweep_interval,
            max_removals_per_sweep,
        }
    }

    /// Create a configuration for development/testing with short cycles.
    pub fn development() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            max_removals_per_sweep: 16,
        }
    }
}

/// Metrics for lock sweep operations.
#[derive(Debug, Default)]
pub struct LockSweepMetrics {
    /// Total idle locks removed since startup
    pub locks_removed: AtomicU64,

    /// Total sweep cycles completed
    pub sweep_cycles: AtomicU64,
}

impl LockSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> LockSweepSnapshot {
        LockSweepSnapshot {
            locks_removed: self.locks_removed.load(Ordering::Relaxed),
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone)]
pub struct LockSweepSnapshot {
    pub locks_removed: u64,
    pub sweep_cycles: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically sweeps idle upload locks.
///
/// Runs until the shutdown signal is received and returns its metrics.
pub async fn lock_sweep_task(
    locks: Arc<HashLockMap>,
    config: LockSweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<LockSweepMetrics> {
    let metrics = Arc::new(LockSweepMetrics::new());

    let mut sweep_interval = interval(config.sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        max_removals = config.max_removals_per_sweep,
        "Lock sweep task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Lock sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);
                let removed = locks.sweep(config.max_removals_per_sweep);
                if removed > 0 {
                    tracing::debug!(removed, remaining = locks.len(), "Swept idle upload locks");
                    metrics.locks_removed.fetch_add(removed, Ordering::Relaxed);
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        locks_removed = snapshot.locks_removed,
        sweep_cycles = snapshot.sweep_cycles,
        "Lock sweep task completed"
    );

    metrics
}
