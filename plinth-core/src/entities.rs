//! Content entities managed by the platform.
//!
//! Pure data structures. Every entity carries created/updated timestamps and
//! a soft-delete pair; stores filter on `is_deleted` rather than removing
//! rows.

use crate::enums::EntityKind;
use crate::error::ValidationError;
use crate::identity::{EntityId, RawContent, Timestamp};
use crate::scalar::ScalarValue;
use crate::schema::ComponentSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

/// Accessor trait every durable entity implements.
///
/// Stores are generic over this trait: it provides the identity, the
/// update watermark incremental indexing filters on, and the soft-delete
/// transition.
pub trait StoredEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind discriminator for this entity type.
    fn kind() -> EntityKind;

    /// Unique identifier of this instance.
    fn id(&self) -> EntityId;

    fn updated_at(&self) -> Timestamp;

    fn is_deleted(&self) -> bool;

    /// Soft-delete this entity in place.
    fn mark_deleted(&mut self, now: Timestamp);
}

/// A CMS page: title, body HTML, and a tree of configured components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_id: EntityId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    /// Raw HTML body; stripped to text at indexing time.
    pub body: String,
    pub is_published: bool,
    pub components: Vec<PageComponent>,
    pub metadata: HashMap<String, ScalarValue>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
}

/// One configured component instance within a page.
///
/// Components form an explicit tree via `children`. All traversal is
/// iterative with a depth limit; see [`Page::validate_components`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageComponent {
    pub component_id: EntityId,
    /// Template this instance is configured from, if any.
    pub template_id: Option<EntityId>,
    pub label: String,
    pub config: HashMap<String, ScalarValue>,
    pub children: Vec<PageComponent>,
}

/// A reusable component template with a config schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTemplate {
    pub template_id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub schema: ComponentSchema,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
}

/// An uploaded file with its content and dedup hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_id: EntityId,
    pub file_name: String,
    pub content_type: String,
    pub byte_size: u64,
    /// Base64-encoded SHA-256 of `content`; dedup key.
    pub content_hash: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub content: RawContent,
    pub metadata: HashMap<String, ScalarValue>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
}

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: EntityId,
    pub display_name: String,
    pub email: String,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
}

macro_rules! impl_stored_entity {
    ($type:ty, $kind:expr, $id_field:ident) => {
        impl StoredEntity for $type {
            fn kind() -> EntityKind {
                $kind
            }

            fn id(&self) -> EntityId {
                self.$id_field
            }

            fn updated_at(&self) -> Timestamp {
                self.updated_at
            }

            fn is_deleted(&self) -> bool {
                self.is_deleted
            }

            fn mark_deleted(&mut self, now: Timestamp) {
                self.is_deleted = true;
                self.deleted_at = Some(now);
                self.updated_at = now;
            }
        }
    };
}

impl_stored_entity!(Page, EntityKind::Page, page_id);
impl_stored_entity!(
    ComponentTemplate,
    EntityKind::ComponentTemplate,
    template_id
);
impl_stored_entity!(StoredFile, EntityKind::File, file_id);
impl_stored_entity!(UserAccount, EntityKind::User, user_id);

impl Page {
    /// Validate every configured component in this page's tree against its
    /// template's schema.
    ///
    /// The walk is iterative and depth-limited: a tree nested deeper than
    /// `max_depth` is rejected outright. Components without a `template_id`
    /// are free-form and skipped; a `template_id` absent from `schemas` is
    /// an error.
    pub fn validate_components(
        &self,
        schemas: &HashMap<EntityId, ComponentSchema>,
        max_depth: usize,
    ) -> Result<(), ValidationError> {
        let mut stack: Vec<(&PageComponent, usize)> =
            self.components.iter().map(|c| (c, 1)).collect();

        while let Some((component, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(ValidationError::InvalidValue {
                    field: "components".to_string(),
                    reason: format!("component nesting exceeds depth limit {}", max_depth),
                });
            }
            if let Some(template_id) = component.template_id {
                let schema =
                    schemas
                        .get(&template_id)
                        .ok_or_else(|| ValidationError::InvalidValue {
                            field: "template_id".to_string(),
                            reason: format!("unknown component template {}", template_id),
                        })?;
                schema.validate(&component.config)?;
            }
            for child in &component.children {
                stack.push((child, depth + 1));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::new_entity_id;
    use crate::schema::{FieldKind, FieldSpec};
    use chrono::Utc;

    fn component(template_id: Option<EntityId>, children: Vec<PageComponent>) -> PageComponent {
        PageComponent {
            component_id: new_entity_id(),
            template_id,
            label: "block".to_string(),
            config: HashMap::new(),
            children,
        }
    }

    fn page_with(components: Vec<PageComponent>) -> Page {
        let now = Utc::now();
        Page {
            page_id: new_entity_id(),
            title: "Home".to_string(),
            slug: "home".to_string(),
            description: None,
            body: "<p>hello</p>".to_string(),
            is_published: true,
            components,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn test_stored_entity_soft_delete() {
        let mut page = page_with(vec![]);
        assert!(!StoredEntity::is_deleted(&page));
        let later = page.updated_at + chrono::Duration::seconds(1);
        page.mark_deleted(later);
        assert!(StoredEntity::is_deleted(&page));
        assert_eq!(page.deleted_at, Some(later));
        assert_eq!(StoredEntity::updated_at(&page), later);
        assert_eq!(<Page as StoredEntity>::kind(), EntityKind::Page);
    }

    #[test]
    fn test_free_form_components_skip_validation() {
        let page = page_with(vec![component(None, vec![component(None, vec![])])]);
        assert!(page.validate_components(&HashMap::new(), 8).is_ok());
    }

    #[test]
    fn test_unknown_template_rejected() {
        let page = page_with(vec![component(Some(new_entity_id()), vec![])]);
        let err = page.validate_components(&HashMap::new(), 8).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidValue { field, .. } if field == "template_id"
        ));
    }

    #[test]
    fn test_configured_component_validated_against_schema() {
        let template_id = new_entity_id();
        let mut schemas = HashMap::new();
        schemas.insert(
            template_id,
            ComponentSchema::new(vec![FieldSpec {
                name: "heading".to_string(),
                kind: FieldKind::Text { max_len: None },
                required: true,
            }]),
        );

        // Config missing the required heading.
        let page = page_with(vec![component(Some(template_id), vec![])]);
        assert!(page.validate_components(&schemas, 8).is_err());

        // Config carrying it.
        let mut good = component(Some(template_id), vec![]);
        good.config
            .insert("heading".to_string(), ScalarValue::Text("Hi".to_string()));
        let page = page_with(vec![good]);
        assert!(page.validate_components(&schemas, 8).is_ok());
    }

    #[test]
    fn test_depth_limit_rejects_deep_trees() {
        // Build a chain 5 levels deep.
        let mut node = component(None, vec![]);
        for _ in 0..4 {
            node = component(None, vec![node]);
        }
        let page = page_with(vec![node]);
        assert!(page.validate_components(&HashMap::new(), 4).is_err());
        assert!(page.validate_components(&HashMap::new(), 5).is_ok());
    }
}
