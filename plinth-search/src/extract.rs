//! Per-kind content extraction into index documents.
//!
//! Extraction is total: oversized text is truncated to the index bounds and
//! component trees deeper than the configured limit are cut off with a
//! warning, never an error. Per-entity failure accounting belongs to the
//! repository write, not to this stage.

use once_cell::sync::Lazy;
use plinth_core::{
    ComponentTemplate, EntityKind, IndexDocument, Page, PageComponent, ScalarValue, StoredEntity,
    StoredFile, UserAccount, MAX_CONTENT_CHARS, MAX_SEARCH_VECTOR_CHARS, MAX_TITLE_CHARS,
};
use regex::Regex;
use std::collections::HashMap;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&[a-zA-Z]{2,8};|&#\d{1,6};").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// An entity the index knows how to extract searchable content from.
pub trait Indexable: StoredEntity {
    /// The display title stored on the index record.
    fn display_title(&self) -> String;

    /// Raw source texts (may contain HTML); concatenated into the record
    /// content and deduplicated into the search vector.
    fn searchable_texts(&self, max_component_depth: usize) -> Vec<String>;

    /// Whether the record is visible to public-only queries.
    fn is_publicly_visible(&self) -> bool;

    /// Scalar metadata copied onto the index record for filter matching.
    fn index_metadata(&self) -> HashMap<String, ScalarValue>;
}

/// Build the index-ready document for an entity.
///
/// Cleans every source text (HTML strip, entity decode, whitespace
/// normalization) and enforces the index char bounds.
pub fn extract_document<T: Indexable>(entity: &T, max_component_depth: usize) -> IndexDocument {
    let title = truncate_chars(&clean_text(&entity.display_title()), MAX_TITLE_CHARS);
    let cleaned: Vec<String> = entity
        .searchable_texts(max_component_depth)
        .iter()
        .map(|text| clean_text(text))
        .filter(|text| !text.is_empty())
        .collect();

    let content = truncate_chars(&cleaned.join(" "), MAX_CONTENT_CHARS);
    let search_vector = build_search_vector(&cleaned, MAX_SEARCH_VECTOR_CHARS);

    IndexDocument {
        entity_kind: T::kind(),
        entity_id: entity.id(),
        title,
        content,
        search_vector,
        is_public: entity.is_publicly_visible(),
        metadata: entity.index_metadata(),
    }
}

/// Strip HTML tags and decode common entities.
pub fn strip_html(input: &str) -> String {
    let without_tags = TAG_RE.replace_all(input, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    ENTITY_RE.replace_all(&decoded, " ").into_owned()
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_whitespace(input: &str) -> String {
    WS_RE.replace_all(input, " ").trim().to_string()
}

/// The full cleaning pipeline applied to every source text.
pub fn clean_text(input: &str) -> String {
    normalize_whitespace(&strip_html(input))
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    input.chars().take(max).collect()
}

/// Build the search vector: the order-preserving deduplicated union of the
/// lowercased tokens of every source text, whitespace-joined and bounded.
///
/// Truncation happens at token granularity so the vector never ends in a
/// partial word.
pub fn build_search_vector(texts: &[String], max_chars: usize) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut vector = String::new();

    for text in texts {
        for token in text.to_lowercase().split_whitespace() {
            if !seen.insert(token.to_string()) {
                continue;
            }
            let added = if vector.is_empty() {
                token.chars().count()
            } else {
                token.chars().count() + 1
            };
            if vector.chars().count() + added > max_chars {
                return vector;
            }
            if !vector.is_empty() {
                vector.push(' ');
            }
            vector.push_str(token);
        }
    }
    vector
}

/// Collect searchable text from a page component tree, iteratively and
/// depth-limited. Content below the limit is dropped with a warning.
fn collect_component_texts(
    page_id: plinth_core::EntityId,
    components: &[PageComponent],
    max_depth: usize,
    out: &mut Vec<String>,
) {
    let mut stack: Vec<(&PageComponent, usize)> = components.iter().map(|c| (c, 1)).collect();
    let mut truncated = false;

    while let Some((component, depth)) = stack.pop() {
        if depth > max_depth {
            truncated = true;
            continue;
        }
        if !component.label.is_empty() {
            out.push(component.label.clone());
        }
        for value in component.config.values() {
            if let ScalarValue::Text(text) = value {
                out.push(text.clone());
            }
        }
        for child in &component.children {
            stack.push((child, depth + 1));
        }
    }

    if truncated {
        tracing::warn!(
            page_id = %page_id,
            max_depth,
            "Component tree exceeds depth limit, deeper content not indexed"
        );
    }
}

impl Indexable for Page {
    fn display_title(&self) -> String {
        self.title.clone()
    }

    fn searchable_texts(&self, max_component_depth: usize) -> Vec<String> {
        let mut texts = vec![self.title.clone()];
        if let Some(description) = &self.description {
            texts.push(description.clone());
        }
        texts.push(self.body.clone());
        collect_component_texts(self.page_id, &self.components, max_component_depth, &mut texts);
        texts
    }

    fn is_publicly_visible(&self) -> bool {
        self.is_published
    }

    fn index_metadata(&self) -> HashMap<String, ScalarValue> {
        let mut metadata = self.metadata.clone();
        metadata.insert("slug".to_string(), ScalarValue::Text(self.slug.clone()));
        metadata.insert(
            "is_published".to_string(),
            ScalarValue::Boolean(self.is_published),
        );
        metadata
    }
}

impl Indexable for ComponentTemplate {
    fn display_title(&self) -> String {
        self.name.clone()
    }

    fn searchable_texts(&self, _max_component_depth: usize) -> Vec<String> {
        let mut texts = vec![self.name.clone()];
        if let Some(description) = &self.description {
            texts.push(description.clone());
        }
        // Field names make templates findable by the config they accept.
        for field in &self.schema.fields {
            texts.push(field.name.clone());
        }
        texts
    }

    fn is_publicly_visible(&self) -> bool {
        // Templates are authoring-surface objects, never public search hits.
        false
    }

    fn index_metadata(&self) -> HashMap<String, ScalarValue> {
        HashMap::from([(
            "field_count".to_string(),
            ScalarValue::Integer(self.schema.fields.len() as i64),
        )])
    }
}

impl Indexable for StoredFile {
    fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.file_name.clone())
    }

    fn searchable_texts(&self, _max_component_depth: usize) -> Vec<String> {
        let mut texts = vec![self.file_name.clone()];
        if let Some(title) = &self.title {
            texts.push(title.clone());
        }
        if let Some(description) = &self.description {
            texts.push(description.clone());
        }
        texts
    }

    fn is_publicly_visible(&self) -> bool {
        self.is_public
    }

    fn index_metadata(&self) -> HashMap<String, ScalarValue> {
        let mut metadata = self.metadata.clone();
        metadata.insert(
            "content_type".to_string(),
            ScalarValue::Text(self.content_type.clone()),
        );
        metadata.insert(
            "byte_size".to_string(),
            ScalarValue::Integer(self.byte_size as i64),
        );
        metadata
    }
}

impl Indexable for UserAccount {
    fn display_title(&self) -> String {
        self.display_name.clone()
    }

    fn searchable_texts(&self, _max_component_depth: usize) -> Vec<String> {
        let mut texts = vec![self.display_name.clone(), self.email.clone()];
        if let Some(bio) = &self.bio {
            texts.push(bio.clone());
        }
        texts
    }

    fn is_publicly_visible(&self) -> bool {
        // Accounts are back-office records, not public content.
        false
    }

    fn index_metadata(&self) -> HashMap<String, ScalarValue> {
        HashMap::from([(
            "is_active".to_string(),
            ScalarValue::Boolean(self.is_active),
        )])
    }
}

/// Kinds with a registered extractor, in full-reindex order.
pub fn indexable_kinds() -> [EntityKind; 4] {
    EntityKind::all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plinth_core::new_entity_id;

    #[test]
    fn test_strip_html_removes_tags_and_entities() {
        let input = "<p>Hello <b>world</b> &amp; friends&nbsp;&hellip;</p>";
        let cleaned = clean_text(input);
        assert_eq!(cleaned, "Hello world & friends");
    }

    #[test]
    fn test_normalize_whitespace_collapses_runs() {
        assert_eq!(normalize_whitespace("  a\t\tb\n\nc  "), "a b c");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_search_vector_dedupes_and_preserves_order() {
        let texts = vec![
            "Apple pie recipe".to_string(),
            "apple tart RECIPE".to_string(),
        ];
        let vector = build_search_vector(&texts, 5000);
        assert_eq!(vector, "apple pie recipe tart");
    }

    #[test]
    fn test_search_vector_truncates_at_token_boundary() {
        let texts = vec!["alpha beta gamma".to_string()];
        let vector = build_search_vector(&texts, 11);
        // "alpha beta" is 10 chars; adding " gamma" would exceed 11.
        assert_eq!(vector, "alpha beta");
    }

    fn page_with_components(components: Vec<PageComponent>) -> Page {
        let now = Utc::now();
        Page {
            page_id: new_entity_id(),
            title: "Landing".to_string(),
            slug: "landing".to_string(),
            description: Some("Main <i>landing</i> page".to_string()),
            body: "<h1>Welcome</h1><p>to the site</p>".to_string(),
            is_published: true,
            components,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    fn component(label: &str, children: Vec<PageComponent>) -> PageComponent {
        PageComponent {
            component_id: new_entity_id(),
            template_id: None,
            label: label.to_string(),
            config: HashMap::from([(
                "caption".to_string(),
                ScalarValue::Text(format!("{} caption", label)),
            )]),
            children,
        }
    }

    #[test]
    fn test_page_extraction_includes_component_tree() {
        let page = page_with_components(vec![component("hero", vec![component("cta", vec![])])]);
        let doc = extract_document(&page, 16);

        assert_eq!(doc.entity_kind, EntityKind::Page);
        assert_eq!(doc.title, "Landing");
        assert!(doc.content.contains("Welcome to the site"));
        assert!(doc.content.contains("hero"));
        assert!(doc.content.contains("cta caption"));
        assert!(doc.is_public);
        assert!(doc.search_vector.contains("landing"));
    }

    #[test]
    fn test_deep_components_are_cut_not_failed() {
        let mut node = component("deepest", vec![]);
        for i in 0..5 {
            node = component(&format!("level{}", i), vec![node]);
        }
        let page = page_with_components(vec![node]);

        let doc = extract_document(&page, 3);
        assert!(doc.content.contains("level4"));
        assert!(!doc.content.contains("deepest"));
    }

    #[test]
    fn test_file_extraction_falls_back_to_file_name() {
        let now = Utc::now();
        let file = StoredFile {
            file_id: new_entity_id(),
            file_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            byte_size: 4,
            content_hash: "hash".to_string(),
            title: None,
            description: Some("Quarterly report".to_string()),
            is_public: true,
            content: vec![1, 2, 3, 4],
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        };
        let doc = extract_document(&file, 16);
        assert_eq!(doc.title, "report.pdf");
        assert!(doc.search_vector.contains("quarterly"));
        assert_eq!(
            doc.metadata.get("content_type"),
            Some(&ScalarValue::Text("application/pdf".to_string()))
        );
    }

    #[test]
    fn test_title_bound_enforced() {
        let mut page = page_with_components(vec![]);
        page.title = "t".repeat(MAX_TITLE_CHARS + 50);
        let doc = extract_document(&page, 16);
        assert_eq!(doc.title.chars().count(), MAX_TITLE_CHARS);
    }
}
