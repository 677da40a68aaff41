//! Search index and indexing job data types.

use crate::enums::{EntityKind, IndexingJobStatus, IndexingJobType};
use crate::identity::{EntityId, Timestamp};
use crate::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum characters stored in an index record title.
pub const MAX_TITLE_CHARS: usize = 500;
/// Maximum characters stored in an index record content body.
pub const MAX_CONTENT_CHARS: usize = 10_000;
/// Maximum characters stored in a search vector.
pub const MAX_SEARCH_VECTOR_CHARS: usize = 5_000;

/// The extracted, index-ready form of an entity.
///
/// Produced by the per-kind extractors and handed to the index repository;
/// text fields are already cleaned and truncated to the bounds above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub title: String,
    pub content: String,
    /// Normalized, deduplicated, whitespace-joined token string.
    pub search_vector: String,
    pub is_public: bool,
    pub metadata: HashMap<String, ScalarValue>,
}

/// One row of the denormalized search index.
///
/// Identity is `(entity_kind, entity_id)`: at most one non-tombstoned record
/// may exist per identity. Removal tombstones the record (`is_deleted` +
/// `deleted_at`); tombstones are physically purged once older than the
/// retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexRecord {
    pub record_id: EntityId,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub title: String,
    pub content: String,
    pub search_vector: String,
    pub is_public: bool,
    pub metadata: HashMap<String, ScalarValue>,
    pub last_indexed_at: Timestamp,
    pub updated_at: Timestamp,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
}

impl SearchIndexRecord {
    /// Build a fresh live record from an extracted document.
    pub fn from_document(doc: IndexDocument, now: Timestamp) -> Self {
        Self {
            record_id: crate::identity::new_entity_id(),
            entity_kind: doc.entity_kind,
            entity_id: doc.entity_id,
            title: doc.title,
            content: doc.content,
            search_vector: doc.search_vector,
            is_public: doc.is_public,
            metadata: doc.metadata,
            last_indexed_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Overwrite this record in place with a re-extracted document.
    pub fn apply_document(&mut self, doc: IndexDocument, now: Timestamp) {
        self.title = doc.title;
        self.content = doc.content;
        self.search_vector = doc.search_vector;
        self.is_public = doc.is_public;
        self.metadata = doc.metadata;
        self.last_indexed_at = now;
        self.updated_at = now;
    }

    /// Soft-delete this record.
    pub fn tombstone(&mut self, now: Timestamp) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

/// Bookkeeping record for one indexing pass.
///
/// Pending -> Running -> Completed | Failed; terminal states are never
/// reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingJob {
    pub job_id: EntityId,
    pub job_type: IndexingJobType,
    pub status: IndexingJobStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub total_entities: u64,
    pub processed_entities: u64,
    pub failed_entities: u64,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, ScalarValue>,
}

impl IndexingJob {
    /// Create a Pending job starting now.
    pub fn new(job_type: IndexingJobType, now: Timestamp) -> Self {
        Self {
            job_id: crate::identity::new_entity_id(),
            job_type,
            status: IndexingJobStatus::Pending,
            started_at: now,
            completed_at: None,
            total_entities: 0,
            processed_entities: 0,
            failed_entities: 0,
            error_message: None,
            metadata: HashMap::new(),
        }
    }

    /// Transition to Running.
    pub fn begin(&mut self) {
        self.status = IndexingJobStatus::Running;
    }

    /// Close the job: Completed iff no entity failed, otherwise Failed with
    /// a count summary.
    pub fn finish(&mut self, now: Timestamp) {
        self.completed_at = Some(now);
        if self.failed_entities == 0 {
            self.status = IndexingJobStatus::Completed;
        } else {
            self.status = IndexingJobStatus::Failed;
            self.error_message = Some(format!(
                "{} of {} entities failed to index",
                self.failed_entities, self.total_entities
            ));
        }
    }

    /// Close the job as Failed with an explicit message.
    pub fn fail(&mut self, message: impl Into<String>, now: Timestamp) {
        self.status = IndexingJobStatus::Failed;
        self.completed_at = Some(now);
        self.error_message = Some(message.into());
    }
}
