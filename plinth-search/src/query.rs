//! Ranked search over the denormalized index, with response caching.
//!
//! The query path never fails outward: any store or cache error degrades to
//! a well-formed empty response and a warning in the log. Search is a
//! convenience surface, not a system of record.

use crate::config::SearchConfig;
use plinth_core::{
    EntityId, EntityKind, IndexingJob, IndexingJobType, PlinthResult, ScalarValue,
    SearchIndexRecord, Timestamp,
};
use plinth_storage::{get_or_add, CacheKey, CacheStore, JobStore, SearchIndexRepository};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Per-term score when the term prefixes the record title.
const TITLE_PREFIX_POINTS: f64 = 3.0;
/// Per-term score when the term appears elsewhere in the title.
const TITLE_CONTAINS_POINTS: f64 = 2.0;
/// Per-term score when the term appears in the content body.
const CONTENT_CONTAINS_POINTS: f64 = 1.0;
/// Floor score when every term matched only the search vector (component
/// and metadata text that is not part of title or body).
const VECTOR_ONLY_POINTS: f64 = 0.5;
/// Score given to every candidate when the query has no terms; ranking
/// degrades to recency order.
const EMPTY_QUERY_POINTS: f64 = 1.0;

/// How many recent jobs the status report includes.
const STATUS_RECENT_JOBS: usize = 10;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// A search request.
///
/// `page` is 1-based; `page_size == 0` means "use the configured default".
/// An empty `kinds` list searches every kind. An empty query lists every
/// candidate in recency order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub kinds: Vec<EntityKind>,
    /// Restrict results to publicly visible records.
    pub public_only: bool,
    /// Equality constraints over record metadata; a record must carry
    /// every listed key with exactly the listed value.
    pub metadata_filters: HashMap<String, ScalarValue>,
    pub page: usize,
    pub page_size: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kinds: Vec::new(),
            public_only: false,
            metadata_filters: HashMap::new(),
            page: 1,
            page_size: 0,
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<EntityKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn public_only(mut self) -> Self {
        self.public_only = true;
        self
    }

    pub fn with_metadata_filter(
        mut self,
        key: impl Into<String>,
        value: impl Into<ScalarValue>,
    ) -> Self {
        self.metadata_filters.insert(key.into(), value.into());
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
    pub last_indexed_at: Timestamp,
}

/// A complete search response page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query as received, echoed for the caller.
    pub query: String,
    pub results: Vec<SearchHit>,
    /// Matches across all pages, not just this one.
    pub total_results: u64,
    pub page: usize,
    pub page_size: usize,
    pub duration_ms: u64,
}

/// One title completion for a query prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub entity_kind: EntityKind,
}

/// A point-in-time summary of indexing health.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexingStatus {
    pub live_records: u64,
    pub running_jobs: u64,
    pub last_full_completed_at: Option<Timestamp>,
    pub last_incremental_completed_at: Option<Timestamp>,
    /// The most recent jobs, newest first.
    pub recent_jobs: Vec<IndexingJob>,
}

// ============================================================================
// QUERY ENGINE
// ============================================================================

/// Ranked, cached search over the index.
///
/// Queries are whitespace-split into terms and every term must appear in
/// a record's title, content, or search vector. Ranking is deterministic:
/// per term, title-prefix beats title-contains beats content-contains,
/// summed across terms and multiplied by the kind's static relevance
/// boost, with `last_indexed_at` (newest first) breaking score ties.
pub struct SearchQueryEngine {
    index: Arc<dyn SearchIndexRepository>,
    jobs: Arc<dyn JobStore>,
    cache: Arc<dyn CacheStore>,
    config: SearchConfig,
}

impl SearchQueryEngine {
    pub fn new(
        index: Arc<dyn SearchIndexRepository>,
        jobs: Arc<dyn JobStore>,
        cache: Arc<dyn CacheStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            index,
            jobs,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Execute a ranked search. Never fails: store and cache errors degrade
    /// to an empty response.
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let started = Instant::now();
        let normalized = normalize_query(&request.query);
        let (page, page_size) = self.clamp_paging(request);

        let digest = search_digest(&normalized, request, page, page_size);
        let key = CacheKey::search_results(&digest);
        let produced = get_or_add(
            self.cache.as_ref(),
            &key,
            self.config.search_cache_ttl,
            || async { self.execute_search(&normalized, request, page, page_size).await },
        )
        .await;

        match produced {
            Ok(mut response) => {
                response.duration_ms = started.elapsed().as_millis() as u64;
                response
            }
            Err(e) => {
                tracing::warn!(query = %request.query, error = %e, "Search degraded to empty results");
                self.empty_response(request, page, page_size, started)
            }
        }
    }

    /// Title completions for a query prefix. Never fails; short queries and
    /// errors both yield an empty list.
    pub async fn suggest(&self, query: &str) -> Vec<Suggestion> {
        let normalized = normalize_query(query);
        if normalized.chars().count() < self.config.min_suggest_len {
            return Vec::new();
        }

        let digest = text_digest(&normalized);
        let key = CacheKey::suggestions(&digest);
        let produced = get_or_add(
            self.cache.as_ref(),
            &key,
            self.config.suggest_cache_ttl,
            || async { self.execute_suggest(&normalized).await },
        )
        .await;

        match produced {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Suggest degraded to empty results");
                Vec::new()
            }
        }
    }

    /// Indexing health summary. Never fails; errors degrade to an empty
    /// status.
    pub async fn indexing_status(&self) -> IndexingStatus {
        let key = CacheKey::indexing_status();
        let produced = get_or_add(
            self.cache.as_ref(),
            &key,
            self.config.status_cache_ttl,
            || async { self.execute_status().await },
        )
        .await;

        match produced {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "Indexing status degraded to empty");
                IndexingStatus::default()
            }
        }
    }

    async fn execute_search(
        &self,
        normalized: &str,
        request: &SearchRequest,
        page: usize,
        page_size: usize,
    ) -> PlinthResult<SearchResponse> {
        let records = self.index.live_records().await?;
        let terms: Vec<&str> = normalized.split_whitespace().collect();

        let mut hits: Vec<SearchHit> = records
            .iter()
            .filter(|r| request.kinds.is_empty() || request.kinds.contains(&r.entity_kind))
            .filter(|r| !request.public_only || r.is_public)
            .filter(|r| {
                request
                    .metadata_filters
                    .iter()
                    .all(|(key, value)| r.metadata.get(key) == Some(value))
            })
            .filter_map(|r| {
                let score = score_record(r, &terms);
                (score > 0.0).then(|| SearchHit {
                    entity_kind: r.entity_kind,
                    entity_id: r.entity_id,
                    title: r.title.clone(),
                    excerpt: build_excerpt(&r.content, &terms, self.config.excerpt_length),
                    score,
                    last_indexed_at: r.last_indexed_at,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_indexed_at.cmp(&a.last_indexed_at))
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        let total_results = hits.len() as u64;
        let results: Vec<SearchHit> = hits
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Ok(SearchResponse {
            query: request.query.clone(),
            results,
            total_results,
            page,
            page_size,
            duration_ms: 0,
        })
    }

    async fn execute_suggest(&self, normalized: &str) -> PlinthResult<Vec<Suggestion>> {
        let records = self.index.live_records().await?;

        // Suggest is an autocomplete surface; only public titles may leak
        // into it.
        let mut matches: Vec<&SearchIndexRecord> = records
            .iter()
            .filter(|r| r.is_public)
            .filter(|r| r.title.to_lowercase().contains(normalized))
            .collect();

        // Prefix completions first, then shorter (more specific) titles.
        matches.sort_by(|a, b| {
            let a_title = a.title.to_lowercase();
            let b_title = b.title.to_lowercase();
            b_title
                .starts_with(normalized)
                .cmp(&a_title.starts_with(normalized))
                .then_with(|| a_title.chars().count().cmp(&b_title.chars().count()))
                .then_with(|| a_title.cmp(&b_title))
        });

        let mut seen = std::collections::HashSet::new();
        let suggestions = matches
            .into_iter()
            .filter(|r| seen.insert(r.title.to_lowercase()))
            .take(self.config.max_suggestions)
            .map(|r| Suggestion {
                text: r.title.clone(),
                entity_kind: r.entity_kind,
            })
            .collect();
        Ok(suggestions)
    }

    async fn execute_status(&self) -> PlinthResult<IndexingStatus> {
        let live_records = self.index.live_count().await?;
        let running = self.jobs.running().await?;
        let last_full = self.jobs.latest_completed(IndexingJobType::Full).await?;
        let last_incremental = self
            .jobs
            .latest_completed(IndexingJobType::Incremental)
            .await?;
        let recent_jobs = self.jobs.recent(STATUS_RECENT_JOBS).await?;

        Ok(IndexingStatus {
            live_records,
            running_jobs: running.len() as u64,
            last_full_completed_at: last_full.and_then(|j| j.completed_at),
            last_incremental_completed_at: last_incremental.and_then(|j| j.completed_at),
            recent_jobs,
        })
    }

    fn clamp_paging(&self, request: &SearchRequest) -> (usize, usize) {
        let page = request.page.max(1);
        let page_size = if request.page_size == 0 {
            self.config.default_page_size
        } else {
            request.page_size.min(self.config.max_page_size)
        };
        (page, page_size)
    }

    fn empty_response(
        &self,
        request: &SearchRequest,
        page: usize,
        page_size: usize,
        started: Instant,
    ) -> SearchResponse {
        SearchResponse {
            query: request.query.clone(),
            results: Vec::new(),
            total_results: 0,
            page,
            page_size,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

// ============================================================================
// RANKING AND EXCERPTS
// ============================================================================

fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Deterministic relevance score; zero means "not a match".
///
/// Every term must appear in the title, content, or search vector for the
/// record to match at all; the per-term contributions are summed and the
/// kind boost applied last. A query with no terms scores every record a
/// flat 1.0, so ranking degrades to recency order.
fn score_record(record: &SearchIndexRecord, terms: &[&str]) -> f64 {
    if terms.is_empty() {
        return EMPTY_QUERY_POINTS;
    }

    let title = record.title.to_lowercase();
    let content = record.content.to_lowercase();

    let mut score = 0.0;
    for term in terms {
        let in_title = title.contains(term);
        let in_content = content.contains(term);
        if !in_title && !in_content && !record.search_vector.contains(term) {
            return 0.0;
        }
        if title.starts_with(term) {
            score += TITLE_PREFIX_POINTS;
        } else if in_title {
            score += TITLE_CONTAINS_POINTS;
        }
        if in_content {
            score += CONTENT_CONTAINS_POINTS;
        }
    }
    // Every term matched, but only through the search vector.
    if score == 0.0 {
        score = VECTOR_ONLY_POINTS;
    }
    score * record.entity_kind.relevance_boost()
}

/// A `target_len`-character excerpt centered on the earliest term
/// occurrence in the content, with ellipsis markers where text was cut.
/// Falls back to a head excerpt when no term appears in the content (a
/// vector-only match or an empty query). Operates on characters, never raw
/// byte offsets.
fn build_excerpt(content: &str, terms: &[&str], target_len: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= target_len {
        return content.trim().to_string();
    }

    let matched_at = terms
        .iter()
        .filter_map(|term| {
            let term_chars: Vec<char> = term.chars().map(lower_char).collect();
            find_term(&chars, &term_chars).map(|at| (at, term_chars.len()))
        })
        .min_by_key(|&(at, _)| at);

    match matched_at {
        Some((term_start, term_len)) => {
            let half = target_len.saturating_sub(term_len) / 2;
            let mut start = term_start.saturating_sub(half);
            let end = (start + target_len).min(chars.len());
            if end - start < target_len {
                start = end.saturating_sub(target_len);
            }
            let body: String = chars[start..end].iter().collect();

            let mut excerpt = String::with_capacity(body.len() + 6);
            if start > 0 {
                excerpt.push_str("...");
            }
            excerpt.push_str(body.trim());
            if end < chars.len() {
                excerpt.push_str("...");
            }
            excerpt
        }
        None => {
            let head: String = chars[..target_len].iter().collect();
            format!("{}...", head.trim_end())
        }
    }
}

/// Case-insensitive character-window scan for the term. Returns the char
/// index of the first occurrence.
fn find_term(chars: &[char], term: &[char]) -> Option<usize> {
    if term.is_empty() || term.len() > chars.len() {
        return None;
    }
    (0..=chars.len() - term.len())
        .find(|&i| (0..term.len()).all(|j| lower_char(chars[i + j]) == term[j]))
}

fn lower_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

// ============================================================================
// CACHE KEY DIGESTS
// ============================================================================

/// Deterministic digest over everything that shapes a search response.
/// Kind and filter order do not matter; `[Page, User]` and `[User, Page]`
/// share a cache entry.
fn search_digest(
    normalized: &str,
    request: &SearchRequest,
    page: usize,
    page_size: usize,
) -> String {
    let mut kinds: Vec<&str> = request.kinds.iter().map(|k| k.as_str()).collect();
    kinds.sort_unstable();
    kinds.dedup();

    let mut filters: Vec<(&String, &ScalarValue)> = request.metadata_filters.iter().collect();
    filters.sort_unstable_by_key(|(key, _)| *key);

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    hasher.update(kinds.join(",").as_bytes());
    hasher.update([0u8, request.public_only as u8]);
    for (key, value) in filters {
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.kind_name().as_bytes());
        hasher.update([0u8]);
        hasher.update(value.to_string().as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(page.to_le_bytes());
    hasher.update(page_size.to_le_bytes());
    hex::encode(hasher.finalize())
}

fn text_digest(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
