//! Structured, hierarchical cache keys.
//!
//! Keys are colon-separated strings (`page:id:<uuid>`, `page:all`,
//! `search:q:<digest>`). The grammar is centralized here so every key a
//! write path must later invalidate has a constructor, and `KeyPattern`
//! can match whole families with a `*` glob.

use plinth_core::{EntityId, EntityKind};
use regex::Regex;
use std::fmt;

/// A fully-formed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Single-entity key: `page:id:<uuid>`.
    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        Self(format!("{}:id:{}", kind.as_str(), id))
    }

    /// Full-listing key: `page:all`.
    pub fn entity_list(kind: EntityKind) -> Self {
        Self(format!("{}:all", kind.as_str()))
    }

    /// Count key: `page:count`.
    pub fn entity_count(kind: EntityKind) -> Self {
        Self(format!("{}:count", kind.as_str()))
    }

    /// Cached search result set, keyed by a request digest.
    pub fn search_results(digest: &str) -> Self {
        Self(format!("search:q:{}", digest))
    }

    /// Cached suggestion list, keyed by a query digest.
    pub fn suggestions(digest: &str) -> Self {
        Self(format!("search:suggest:{}", digest))
    }

    /// The indexing status dashboard read.
    pub fn indexing_status() -> Self {
        Self("search:status".to_string())
    }

    /// Escape hatch for keys outside the standard grammar.
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A glob over cache keys, where `*` matches any run of characters.
///
/// Compiled to an anchored regex at construction so matching is cheap on
/// the invalidation path.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    glob: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn new(glob: impl Into<String>) -> Self {
        let glob = glob.into();
        let mut pattern = String::with_capacity(glob.len() + 8);
        pattern.push('^');
        for ch in glob.chars() {
            match ch {
                '*' => pattern.push_str(".*"),
                ch => pattern.push_str(&regex::escape(&ch.to_string())),
            }
        }
        pattern.push('$');
        // The only metacharacter we emit unescaped is the translated `*`,
        // so compilation cannot fail on user-shaped key text.
        let regex = Regex::new(&pattern).unwrap_or_else(|_| Regex::new("^$").unwrap());
        Self { glob, regex }
    }

    /// Every key of a kind: `page:*`.
    pub fn kind_all(kind: EntityKind) -> Self {
        Self::new(format!("{}:*", kind.as_str()))
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn matches_key(&self, key: &CacheKey) -> bool {
        self.matches(key.as_str())
    }

    pub fn as_glob(&self) -> &str {
        &self.glob
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::new_entity_id;

    #[test]
    fn test_key_grammar() {
        let id = new_entity_id();
        assert_eq!(
            CacheKey::entity(EntityKind::Page, id).as_str(),
            format!("page:id:{}", id)
        );
        assert_eq!(CacheKey::entity_list(EntityKind::File).as_str(), "file:all");
        assert_eq!(CacheKey::entity_count(EntityKind::User).as_str(), "user:count");
        assert_eq!(CacheKey::search_results("abc").as_str(), "search:q:abc");
        assert_eq!(CacheKey::indexing_status().as_str(), "search:status");
    }

    #[test]
    fn test_kind_all_matches_every_key_of_kind() {
        let pattern = KeyPattern::kind_all(EntityKind::Page);
        let id = new_entity_id();
        assert!(pattern.matches_key(&CacheKey::entity(EntityKind::Page, id)));
        assert!(pattern.matches_key(&CacheKey::entity_list(EntityKind::Page)));
        assert!(!pattern.matches_key(&CacheKey::entity(EntityKind::File, id)));
        assert!(!pattern.matches("search:status"));
    }

    #[test]
    fn test_glob_is_anchored() {
        let pattern = KeyPattern::new("page:all");
        assert!(pattern.matches("page:all"));
        assert!(!pattern.matches("page:all:extra"));
        assert!(!pattern.matches("xpage:all"));
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        let pattern = KeyPattern::new("page:id:a.b");
        assert!(pattern.matches("page:id:a.b"));
        assert!(!pattern.matches("page:id:aXb"));
    }

    #[test]
    fn test_interior_wildcard() {
        let id = new_entity_id();
        let pattern = KeyPattern::new(format!("page:*:{}", id));
        assert!(pattern.matches(&format!("page:id:{}", id)));
        assert!(pattern.matches(&format!("page:images:{}", id)));
        assert!(!pattern.matches(&format!("page:id:{}", new_entity_id())));
    }
}
