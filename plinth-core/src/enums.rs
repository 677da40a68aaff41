//! Discriminator enums for PLINTH entities and indexing jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Entity kind discriminator for the heterogeneous search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Page,
    ComponentTemplate,
    File,
    User,
}

impl EntityKind {
    /// Convert to the string representation used in index rows and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Page => "page",
            EntityKind::ComponentTemplate => "component_template",
            EntityKind::File => "file",
            EntityKind::User => "user",
        }
    }

    /// Parse from the stored string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EntityKindParseError> {
        match s.to_lowercase().as_str() {
            "page" => Ok(EntityKind::Page),
            "component_template" => Ok(EntityKind::ComponentTemplate),
            "file" => Ok(EntityKind::File),
            "user" => Ok(EntityKind::User),
            _ => Err(EntityKindParseError(s.to_string())),
        }
    }

    /// Static relevance boost applied to search scores for this kind.
    pub fn relevance_boost(&self) -> f64 {
        match self {
            EntityKind::Page => 1.2,
            EntityKind::ComponentTemplate => 1.1,
            EntityKind::File => 1.0,
            EntityKind::User => 0.8,
        }
    }

    /// Every kind the index supports, in reindex order.
    pub fn all() -> [EntityKind; 4] {
        [
            EntityKind::Page,
            EntityKind::ComponentTemplate,
            EntityKind::File,
            EntityKind::User,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EntityKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid entity kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKindParseError(pub String);

impl fmt::Display for EntityKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid entity kind: {}", self.0)
    }
}

impl std::error::Error for EntityKindParseError {}

// ============================================================================
// INDEXING JOB ENUMS
// ============================================================================

/// Kind of indexing pass a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexingJobType {
    /// Tombstone everything, then rebuild the whole index
    Full,
    /// Re-index only entities updated since a watermark
    Incremental,
}

impl IndexingJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingJobType::Full => "Full",
            IndexingJobType::Incremental => "Incremental",
        }
    }
}

impl fmt::Display for IndexingJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an indexing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexingJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl IndexingJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingJobStatus::Pending => "Pending",
            IndexingJobStatus::Running => "Running",
            IndexingJobStatus::Completed => "Completed",
            IndexingJobStatus::Failed => "Failed",
        }
    }

    /// Terminal states are never reopened.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IndexingJobStatus::Completed | IndexingJobStatus::Failed
        )
    }
}

impl fmt::Display for IndexingJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
