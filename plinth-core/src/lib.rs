//! PLINTH Core - Content Platform Data Types
//!
//! Pure data structures shared by every other crate: identity aliases,
//! content entities, the search index and job records, component schemas,
//! and the error taxonomy. This crate contains no storage or coordination
//! logic.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod index;
pub mod scalar;
pub mod schema;

pub use entities::{ComponentTemplate, Page, PageComponent, StoredEntity, StoredFile, UserAccount};
pub use enums::{EntityKind, EntityKindParseError, IndexingJobStatus, IndexingJobType};
pub use error::{
    ConfigError, IntegrityError, PlinthError, PlinthResult, StorageError, ValidationError,
};
pub use identity::{
    compute_content_hash, encode_content_hash, new_entity_id, ContentHash, EntityId, RawContent,
    Timestamp,
};
pub use index::{
    IndexDocument, IndexingJob, SearchIndexRecord, MAX_CONTENT_CHARS, MAX_SEARCH_VECTOR_CHARS,
    MAX_TITLE_CHARS,
};
pub use scalar::ScalarValue;
pub use schema::{ComponentSchema, FieldKind, FieldSpec};
