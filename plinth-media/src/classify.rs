//! Coarse content classification.
//!
//! Uploads are bucketed into broad categories from the declared content
//! type, falling back to the file extension when the declared type is
//! missing or unhelpful. Byte-level signature checks live in the validator;
//! classification is intentionally shallow and never reads the payload.

use std::fmt;

/// Broad content category of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    Image,
    Document,
    Video,
    Audio,
    Other,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Image => "image",
            ContentCategory::Document => "document",
            ContentCategory::Video => "video",
            ContentCategory::Audio => "audio",
            ContentCategory::Other => "other",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify an upload from its declared content type and file name.
///
/// The content type wins when it carries a recognizable prefix; otherwise
/// the extension decides. Unknown on both axes is `Other`.
pub fn classify(content_type: &str, file_name: &str) -> ContentCategory {
    let content_type = content_type.trim().to_lowercase();

    if let Some(category) = classify_content_type(&content_type) {
        return category;
    }
    classify_extension(file_name).unwrap_or(ContentCategory::Other)
}

fn classify_content_type(content_type: &str) -> Option<ContentCategory> {
    if content_type.starts_with("image/") {
        return Some(ContentCategory::Image);
    }
    if content_type.starts_with("video/") {
        return Some(ContentCategory::Video);
    }
    if content_type.starts_with("audio/") {
        return Some(ContentCategory::Audio);
    }
    if content_type.starts_with("text/") {
        return Some(ContentCategory::Document);
    }
    match content_type {
        "application/pdf"
        | "application/msword"
        | "application/json"
        | "application/rtf"
        | "application/vnd.oasis.opendocument.text" => Some(ContentCategory::Document),
        ct if ct.starts_with("application/vnd.openxmlformats-officedocument") => {
            Some(ContentCategory::Document)
        }
        _ => None,
    }
}

fn classify_extension(file_name: &str) -> Option<ContentCategory> {
    let extension = file_name.rsplit_once('.')?.1.to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "tiff" => {
            Some(ContentCategory::Image)
        }
        "pdf" | "doc" | "docx" | "odt" | "rtf" | "txt" | "md" | "csv" | "json" => {
            Some(ContentCategory::Document)
        }
        "mp4" | "mov" | "webm" | "mkv" | "avi" => Some(ContentCategory::Video),
        "mp3" | "wav" | "ogg" | "flac" | "aac" => Some(ContentCategory::Audio),
        _ => None,
    }
}
