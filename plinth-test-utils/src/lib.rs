//! PLINTH Test Utilities
//!
//! Centralized test infrastructure for the PLINTH workspace:
//! - Proptest generators for entity and index types
//! - Pre-built fixtures for common scenarios
//! - Custom assertions for PLINTH-specific error variants
//! - Test tracing setup

// Re-export the in-memory backends so test code has one import surface.
pub use plinth_storage::{
    InMemoryCacheStore, InMemoryEntityStore, InMemoryJobStore, InMemorySearchIndex,
};

// Re-export core types for convenience
pub use plinth_core::{
    compute_content_hash, encode_content_hash, new_entity_id, ComponentSchema, ComponentTemplate,
    ContentHash, EntityId, EntityKind, FieldKind, FieldSpec, IndexDocument, IndexingJob,
    IndexingJobStatus, IndexingJobType, IntegrityError, Page, PageComponent, PlinthError,
    PlinthResult, RawContent, ScalarValue, SearchIndexRecord, StorageError, StoredEntity,
    StoredFile, Timestamp, UserAccount, ValidationError,
};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Once;

// ============================================================================
// TRACING
// ============================================================================

static TRACING_INIT: Once = Once::new();

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; safe to call from every test, the subscriber is
/// installed once per process.
pub fn init_test_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating PLINTH entity types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random EntityId.
    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a Timestamp within a reasonable range (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_577_836_800i64..1_893_456_000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate an EntityKind variant.
    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::Page),
            Just(EntityKind::ComponentTemplate),
            Just(EntityKind::File),
            Just(EntityKind::User),
        ]
    }

    /// Generate a ScalarValue variant.
    pub fn arb_scalar() -> impl Strategy<Value = ScalarValue> {
        prop_oneof![
            any::<bool>().prop_map(ScalarValue::Boolean),
            any::<i64>().prop_map(ScalarValue::Integer),
            (-1.0e6f64..1.0e6).prop_map(ScalarValue::Float),
            "[a-zA-Z0-9 ]{0,40}".prop_map(ScalarValue::Text),
        ]
    }

    /// Generate a small metadata map.
    pub fn arb_metadata() -> impl Strategy<Value = HashMap<String, ScalarValue>> {
        prop::collection::hash_map("[a-z_]{1,12}", arb_scalar(), 0..4)
    }

    /// Generate a human-ish title.
    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,10}( [a-z]{2,10}){0,4}"
    }

    /// Generate a URL slug.
    pub fn arb_slug() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{2,30}"
    }

    /// Generate a flat (leaf) page component.
    pub fn arb_leaf_component() -> impl Strategy<Value = PageComponent> {
        ("[a-z]{3,12}", arb_metadata()).prop_map(|(label, config)| PageComponent {
            component_id: new_entity_id(),
            template_id: None,
            label,
            config,
            children: Vec::new(),
        })
    }

    /// Generate a component tree up to three levels deep.
    pub fn arb_component_tree() -> impl Strategy<Value = PageComponent> {
        arb_leaf_component().prop_recursive(3, 12, 3, |inner| {
            ("[a-z]{3,12}", prop::collection::vec(inner, 0..3)).prop_map(|(label, children)| {
                PageComponent {
                    component_id: new_entity_id(),
                    template_id: None,
                    label,
                    config: HashMap::new(),
                    children,
                }
            })
        })
    }

    /// Generate a Page entity.
    pub fn arb_page() -> impl Strategy<Value = Page> {
        (
            arb_title(),
            arb_slug(),
            "[a-zA-Z0-9<>/ ]{0,200}",
            any::<bool>(),
            prop::collection::vec(arb_component_tree(), 0..3),
            arb_metadata(),
            arb_timestamp(),
        )
            .prop_map(
                |(title, slug, body, is_published, components, metadata, ts)| Page {
                    page_id: new_entity_id(),
                    title,
                    slug,
                    description: None,
                    body,
                    is_published,
                    components,
                    metadata,
                    created_at: ts,
                    updated_at: ts,
                    is_deleted: false,
                    deleted_at: None,
                },
            )
    }

    /// Generate a StoredFile with consistent byte size and content hash.
    pub fn arb_stored_file() -> impl Strategy<Value = StoredFile> {
        (
            "[a-z]{3,12}\\.(png|jpg|pdf|txt)",
            prop::collection::vec(any::<u8>(), 1..512),
            any::<bool>(),
            arb_timestamp(),
        )
            .prop_map(|(file_name, content, is_public, ts)| {
                let content_type = match file_name.rsplit('.').next() {
                    Some("png") => "image/png",
                    Some("jpg") => "image/jpeg",
                    Some("pdf") => "application/pdf",
                    _ => "text/plain",
                };
                StoredFile {
                    file_id: new_entity_id(),
                    file_name,
                    content_type: content_type.to_string(),
                    byte_size: content.len() as u64,
                    content_hash: encode_content_hash(&compute_content_hash(&content)),
                    title: None,
                    description: None,
                    is_public,
                    content,
                    metadata: HashMap::new(),
                    created_at: ts,
                    updated_at: ts,
                    is_deleted: false,
                    deleted_at: None,
                }
            })
    }

    /// Generate a UserAccount entity.
    pub fn arb_user_account() -> impl Strategy<Value = UserAccount> {
        ("[A-Z][a-z]{2,10}", "[a-z]{3,10}", any::<bool>(), arb_timestamp()).prop_map(
            |(display_name, local, is_active, ts)| UserAccount {
                user_id: new_entity_id(),
                display_name,
                email: format!("{}@example.com", local),
                bio: None,
                is_active,
                created_at: ts,
                updated_at: ts,
                is_deleted: false,
                deleted_at: None,
            },
        )
    }

    /// Generate an IndexDocument.
    pub fn arb_index_document() -> impl Strategy<Value = IndexDocument> {
        (
            arb_entity_kind(),
            arb_title(),
            "[a-zA-Z0-9 ]{0,300}",
            any::<bool>(),
            arb_metadata(),
        )
            .prop_map(|(entity_kind, title, content, is_public, metadata)| {
                let search_vector = format!("{} {}", title, content).to_lowercase();
                IndexDocument {
                    entity_kind,
                    entity_id: new_entity_id(),
                    title,
                    content,
                    search_vector,
                    is_public,
                    metadata,
                }
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// A published page with one component and a body worth indexing.
    pub fn sample_page(title: &str) -> Page {
        let now = Utc::now();
        Page {
            page_id: new_entity_id(),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            description: Some(format!("{} description", title)),
            body: format!("<h1>{}</h1><p>Body text for {}.</p>", title, title),
            is_published: true,
            components: vec![PageComponent {
                component_id: new_entity_id(),
                template_id: None,
                label: "hero".to_string(),
                config: HashMap::from([(
                    "heading".to_string(),
                    ScalarValue::Text(format!("{} hero", title)),
                )]),
                children: Vec::new(),
            }],
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// A component template with a minimal text schema.
    pub fn sample_template(name: &str) -> ComponentTemplate {
        let now = Utc::now();
        ComponentTemplate {
            template_id: new_entity_id(),
            name: name.to_string(),
            description: None,
            schema: ComponentSchema::new(vec![FieldSpec {
                name: "heading".to_string(),
                kind: FieldKind::Text { max_len: Some(120) },
                required: true,
            }]),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// A stored file built from the given bytes, with a consistent size and
    /// content hash.
    pub fn sample_file(file_name: &str, content_type: &str, content: &[u8]) -> StoredFile {
        let now = Utc::now();
        StoredFile {
            file_id: new_entity_id(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            byte_size: content.len() as u64,
            content_hash: encode_content_hash(&compute_content_hash(content)),
            title: None,
            description: None,
            is_public: true,
            content: content.to_vec(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// An active user account.
    pub fn sample_user(display_name: &str) -> UserAccount {
        let now = Utc::now();
        UserAccount {
            user_id: new_entity_id(),
            display_name: display_name.to_string(),
            email: format!(
                "{}@example.com",
                display_name.to_lowercase().replace(' ', ".")
            ),
            bio: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// An index document for an arbitrary page-like entity.
    pub fn sample_document(kind: EntityKind, title: &str, content: &str) -> IndexDocument {
        IndexDocument {
            entity_kind: kind,
            entity_id: new_entity_id(),
            title: title.to_string(),
            content: content.to_string(),
            search_vector: format!("{} {}", title, content).to_lowercase(),
            is_public: true,
            metadata: HashMap::new(),
        }
    }

    /// Minimal valid JPEG bytes (SOI marker plus padding).
    pub fn jpeg_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.resize(len.max(4), 0xAB);
        bytes
    }

    /// Minimal valid PNG bytes (8-byte signature plus padding).
    pub fn png_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(len.max(8), 0xCD);
        bytes
    }

    /// Minimal valid PDF bytes (`%PDF-` header plus padding).
    pub fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(len.max(9), b' ');
        bytes
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for PLINTH-specific error variants.

    use super::*;

    /// Assert that a PlinthResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &PlinthResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a PlinthResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &PlinthResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a PlinthResult is any validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &PlinthResult<T>) {
        match result {
            Err(PlinthError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a PlinthResult is a NotFound storage error for the kind.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &PlinthResult<T>, kind: EntityKind) {
        match result {
            Err(PlinthError::Storage(StorageError::NotFound { kind: found, .. }))
                if *found == kind => {}
            other => panic!("Expected NotFound for {}, got: {:?}", kind, other),
        }
    }

    /// Assert that a PlinthResult is any integrity error.
    #[track_caller]
    pub fn assert_integrity_error<T: std::fmt::Debug>(result: &PlinthResult<T>) {
        match result {
            Err(PlinthError::Integrity(_)) => {}
            other => panic!("Expected Integrity error, got: {:?}", other),
        }
    }
}
