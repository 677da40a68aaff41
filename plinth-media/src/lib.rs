//! PLINTH Media - Upload Coordination
//!
//! The upload half of the platform core: content classification, size and
//! type validation, the upload coordinator with content-hash deduplication
//! under per-hash locks and a global concurrency permit, and the periodic
//! sweep of idle hash locks.

pub mod classify;
pub mod locks;
pub mod upload;
pub mod validate;

pub use classify::{classify, ContentCategory};
pub use locks::{
    lock_sweep_task, HashLockMap, LockSweepConfig, LockSweepMetrics, LockSweepSnapshot,
};
pub use upload::{
    BatchFailure, BatchUploadReport, UploadConfig, UploadCoordinator, UploadOutcome, UploadRequest,
};
pub use validate::{BasicUploadValidator, PostProcessor, UploadValidator};
