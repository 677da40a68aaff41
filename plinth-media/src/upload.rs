//! Upload coordination: classify, validate, dedup, persist, verify.
//!
//! Two layers of coordination sit above the entity store. A global
//! semaphore bounds how many uploads hold payload bytes at once; callers
//! queue rather than fail under load. A per-content-hash lock serializes
//! uploads of byte-identical content, so the duplicate check and the write
//! are one critical section: exactly one caller stores the bytes, everyone
//! else gets the winner's record back.

use crate::classify::{classify, ContentCategory};
use crate::locks::HashLockMap;
use crate::validate::{PostProcessor, UploadValidator};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use plinth_core::{
    compute_content_hash, encode_content_hash, new_entity_id, EntityKind, IntegrityError,
    PlinthError, PlinthResult, RawContent, ScalarValue, StorageError, StoredFile, ValidationError,
};
use plinth_storage::EntityStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default upload size cap (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the upload coordinator.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Hard cap on upload payload size.
    pub max_file_size: u64,

    /// Concurrent uploads holding payload bytes (default: available
    /// parallelism). Further callers queue on the permit.
    pub max_concurrent: usize,

    /// Categories this deployment accepts.
    pub accepted_categories: Vec<ContentCategory>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_concurrent: available_parallelism(),
            accepted_categories: vec![ContentCategory::Image, ContentCategory::Document],
        }
    }
}

impl UploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Environment Variables
    /// - `PLINTH_UPLOAD_MAX_FILE_SIZE_BYTES`: payload size cap (default: 52428800)
    /// - `PLINTH_UPLOAD_MAX_CONCURRENT`: concurrent upload bound (default: available parallelism)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_file_size: std::env::var("PLINTH_UPLOAD_MAX_FILE_SIZE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES),
            max_concurrent: std::env::var("PLINTH_UPLOAD_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent),
            accepted_categories: defaults.accepted_categories,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_accepted_categories(mut self, categories: Vec<ContentCategory>) -> Self {
        self.accepted_categories = categories;
        self
    }

    pub fn validate(&self) -> PlinthResult<()> {
        if self.max_concurrent == 0 {
            return Err(plinth_core::ConfigError::InvalidValue {
                field: "max_concurrent".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.accepted_categories.is_empty() {
            return Err(plinth_core::ConfigError::MissingRequired {
                field: "accepted_categories".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// REQUEST / OUTCOME TYPES
// ============================================================================

/// One upload request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    /// Byte count the caller claims to have read; checked against the
    /// payload as a corruption guard.
    pub declared_byte_size: u64,
    pub bytes: RawContent,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub metadata: HashMap<String, ScalarValue>,
    /// Run the post-processor synchronously within the upload.
    pub process_immediately: bool,
}

impl UploadRequest {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: RawContent,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            declared_byte_size: bytes.len() as u64,
            bytes,
            title: None,
            description: None,
            is_public: false,
            metadata: HashMap::new(),
            process_immediately: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_declared_byte_size(mut self, declared: u64) -> Self {
        self.declared_byte_size = declared;
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    pub fn process_immediately(mut self) -> Self {
        self.process_immediately = true;
        self
    }
}

/// A completed upload: the persisted (or pre-existing) file record.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file: StoredFile,
    /// True when the bytes already existed and no write happened.
    pub deduplicated: bool,
}

/// One failed entry of a batch upload.
#[derive(Debug)]
pub struct BatchFailure {
    pub file_name: String,
    pub error: PlinthError,
}

/// Partial-failure summary of a batch upload.
#[derive(Debug, Default)]
pub struct BatchUploadReport {
    pub succeeded: Vec<UploadOutcome>,
    pub failed: Vec<BatchFailure>,
}

impl BatchUploadReport {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Coordinates uploads: classification, validation, global concurrency
/// bound, content-hash dedup under per-hash locks, persist-and-verify.
pub struct UploadCoordinator {
    store: Arc<dyn EntityStore<StoredFile>>,
    validator: Arc<dyn UploadValidator>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    config: UploadConfig,
    permits: Arc<Semaphore>,
    locks: Arc<HashLockMap>,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<dyn EntityStore<StoredFile>>,
        validator: Arc<dyn UploadValidator>,
        config: UploadConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            store,
            validator,
            post_processor: None,
            config,
            permits,
            locks: Arc::new(HashLockMap::new()),
        }
    }

    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// The coordinator's hash→lock map, for wiring up the sweep task.
    pub fn locks(&self) -> Arc<HashLockMap> {
        Arc::clone(&self.locks)
    }

    /// Upload one file.
    ///
    /// Validation failures abort before any write. Byte-identical content
    /// is never stored twice: a duplicate short-circuits inside the
    /// per-hash lock and returns the existing record.
    pub async fn upload(&self, request: UploadRequest) -> PlinthResult<UploadOutcome> {
        if request.bytes.is_empty() {
            return Err(ValidationError::EmptyUpload.into());
        }

        let category = classify(&request.content_type, &request.file_name);
        if !self.config.accepted_categories.contains(&category) {
            return Err(ValidationError::UnsupportedType {
                content_type: request.content_type.clone(),
                file_name: request.file_name.clone(),
            }
            .into());
        }

        self.validator.validate(&request, category).await?;

        // Queue for a global permit before touching the payload further.
        // Guard declaration order matters: the hash lock below is declared
        // after the permit, so it drops first (narrowest scope released
        // first).
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StorageError::Unavailable {
                reason: "upload permit pool closed".to_string(),
            })?;

        let actual = request.bytes.len() as u64;
        if actual != request.declared_byte_size {
            return Err(IntegrityError::LengthMismatch {
                declared: request.declared_byte_size,
                actual,
            }
            .into());
        }

        let hash = encode_content_hash(&compute_content_hash(&request.bytes));
        let _hash_guard = self.locks.lock_for(&hash).lock_owned().await;

        // Duplicate check runs inside the lock: a racing identical upload
        // is still parked on the mutex and will see this one's write.
        let existing = self
            .store
            .find(&|f: &StoredFile| f.content_hash == hash)
            .await?;
        if let Some(file) = existing.into_iter().next() {
            tracing::debug!(
                file_id = %file.file_id,
                content_hash = %hash,
                "Duplicate upload detected, returning existing record"
            );
            return Ok(UploadOutcome {
                file,
                deduplicated: true,
            });
        }

        let now = Utc::now();
        let file = StoredFile {
            file_id: new_entity_id(),
            file_name: request.file_name.clone(),
            content_type: request.content_type.clone(),
            byte_size: actual,
            content_hash: hash.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            is_public: request.is_public,
            content: request.bytes.clone(),
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        };
        let persisted = self.store.add(file).await?;
        let stored = self.verify_persisted(persisted, actual).await?;

        if request.process_immediately {
            if let Some(processor) = &self.post_processor {
                // Advisory: the entity is already durable, a processing
                // failure must not fail the upload.
                if let Err(e) = processor.process(&stored).await {
                    tracing::warn!(
                        file_id = %stored.file_id,
                        error = %e,
                        "Post-processing failed, upload unaffected"
                    );
                }
            }
        }

        tracing::info!(
            file_id = %stored.file_id,
            file_name = %stored.file_name,
            byte_size = stored.byte_size,
            category = %category,
            "File uploaded"
        );
        Ok(UploadOutcome {
            file: stored,
            deduplicated: false,
        })
    }

    /// Upload a batch, sequentially or fanned out across the permit bound.
    /// Per-file failures are collected, never aborting the rest.
    pub async fn upload_batch(
        &self,
        requests: Vec<UploadRequest>,
        parallel: bool,
    ) -> BatchUploadReport {
        let mut report = BatchUploadReport::default();

        if parallel {
            let results: Vec<(String, PlinthResult<UploadOutcome>)> = stream::iter(requests)
                .map(|request| {
                    let file_name = request.file_name.clone();
                    async move { (file_name, self.upload(request).await) }
                })
                .buffer_unordered(self.config.max_concurrent.max(1))
                .collect()
                .await;
            for (file_name, result) in results {
                self.tally(&mut report, file_name, result);
            }
        } else {
            for request in requests {
                let file_name = request.file_name.clone();
                let result = self.upload(request).await;
                self.tally(&mut report, file_name, result);
            }
        }

        tracing::info!(
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "Batch upload finished"
        );
        report
    }

    fn tally(
        &self,
        report: &mut BatchUploadReport,
        file_name: String,
        result: PlinthResult<UploadOutcome>,
    ) {
        match result {
            Ok(outcome) => report.succeeded.push(outcome),
            Err(error) => {
                tracing::warn!(file_name = %file_name, error = %error, "Batch entry failed");
                report.failed.push(BatchFailure { file_name, error });
            }
        }
    }

    /// Re-fetch the just-written record and verify the persisted byte
    /// length. A mismatch rolls the write back (best effort) and fails the
    /// upload.
    async fn verify_persisted(
        &self,
        persisted: StoredFile,
        written: u64,
    ) -> PlinthResult<StoredFile> {
        let stored = self
            .store
            .get_by_id(persisted.file_id)
            .await?
            .ok_or(StorageError::NotFound {
                kind: EntityKind::File,
                id: persisted.file_id,
            })?;

        let held = stored.content.len() as u64;
        if held != written || stored.byte_size != written {
            tracing::error!(
                file_id = %persisted.file_id,
                written,
                persisted = held,
                "Persisted length mismatch, rolling back"
            );
            if let Err(e) = self.store.soft_delete(persisted.file_id).await {
                tracing::warn!(
                    file_id = %persisted.file_id,
                    error = %e,
                    "Rollback of truncated upload failed"
                );
            }
            return Err(IntegrityError::PersistedLengthMismatch {
                written,
                persisted: held,
            }
            .into());
        }
        Ok(stored)
    }
}
