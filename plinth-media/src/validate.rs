//! Upload validation and post-processing seams.
//!
//! Validation runs before anything is written: a failure is a typed
//! rejection with no side effects. Post-processing runs after the entity is
//! persisted and is advisory; see the coordinator.

use crate::classify::ContentCategory;
use crate::upload::UploadRequest;
use async_trait::async_trait;
use plinth_core::{PlinthResult, StoredFile, ValidationError};

/// Pre-write validation of an upload.
#[async_trait]
pub trait UploadValidator: Send + Sync {
    /// Validate a classified upload. Returning an error aborts the upload
    /// before any write.
    async fn validate(
        &self,
        request: &UploadRequest,
        category: ContentCategory,
    ) -> PlinthResult<()>;
}

/// Post-persist processing hook (thumbnailing, text extraction).
///
/// Runs synchronously within the upload when the caller requests immediate
/// processing; failures are logged by the coordinator and never fail the
/// upload.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    async fn process(&self, file: &StoredFile) -> PlinthResult<()>;
}

/// Default validator: size cap plus byte-signature agreement with the
/// declared category.
#[derive(Debug, Clone)]
pub struct BasicUploadValidator {
    max_file_size: u64,
}

impl BasicUploadValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

#[async_trait]
impl UploadValidator for BasicUploadValidator {
    async fn validate(
        &self,
        request: &UploadRequest,
        category: ContentCategory,
    ) -> PlinthResult<()> {
        let size = request.bytes.len() as u64;
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max_size: self.max_file_size,
            }
            .into());
        }

        // Spot-check well-known signatures. Formats without a recognized
        // signature pass; deep format validation is out of scope here.
        if let Some(detected) = sniff_category(&request.bytes) {
            if detected != category {
                return Err(ValidationError::CategoryMismatch {
                    expected: category.as_str().to_string(),
                    detected: detected.as_str().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Detect the category from leading magic bytes, when recognizable.
fn sniff_category(bytes: &[u8]) -> Option<ContentCategory> {
    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(&PNG_SIGNATURE)
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
    {
        return Some(ContentCategory::Image);
    }
    if bytes.starts_with(b"%PDF-") {
        return Some(ContentCategory::Document);
    }
    None
}
