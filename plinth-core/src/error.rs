//! Error taxonomy for PLINTH operations.
//!
//! Errors are grouped by category; `PlinthError` aggregates them for
//! cross-layer propagation. Best-effort paths (cache invalidation, advisory
//! reads, background sweeps) log and swallow; the primary data path
//! propagates.

use crate::enums::EntityKind;
use crate::identity::EntityId;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind} with id {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: EntityKind, reason: String },

    #[error("Update failed for {kind} with id {id}: {reason}")]
    UpdateFailed {
        kind: EntityKind,
        id: EntityId,
        reason: String,
    },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Input validation errors. Nothing is persisted when these are returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Upload is empty")]
    EmptyUpload,

    #[error("File too large: {size} bytes exceeds limit of {max_size}")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("Unsupported file type: {content_type} ({file_name})")]
    UnsupportedType {
        content_type: String,
        file_name: String,
    },

    #[error("Content category mismatch: expected {expected}, detected {detected}")]
    CategoryMismatch { expected: String, detected: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Schema violation on {field}: {reason}")]
    SchemaViolation { field: String, reason: String },
}

/// Byte-level integrity failures. Hard failures: the operation aborts and
/// nothing stays partially committed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Read length mismatch: declared {declared} bytes, read {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("Persisted length mismatch: wrote {written} bytes, store holds {persisted}")]
    PersistedLengthMismatch { written: u64, persisted: u64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No index source registered for {kind}")]
    SourceNotRegistered { kind: EntityKind },
}

/// Master error type for all PLINTH errors.
#[derive(Debug, Clone, Error)]
pub enum PlinthError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for PLINTH operations.
pub type PlinthResult<T> = Result<T, PlinthError>;
