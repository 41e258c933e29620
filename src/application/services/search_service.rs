use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::application::ports::Cache;
use crate::application::services::ai_gateway::AiGateway;
use crate::application::services::relevance::{
    QueryClass, RelevanceScorer, RetrievalSignals, ScoringExplanation,
};
use crate::application::services::taxonomy_service::TaxonomyService;
use crate::domain::entities::{Document, TopQuery};
use crate::domain::repositories::{
    DocumentFilter, DocumentRepository, DocumentRepositoryError, PageRequest,
    SearchQueryRepository, SortDirection, SortKey,
};
use crate::domain::value_objects::DocumentStatus;

/// Cache key for the corpus-wide facet aggregation.
pub const FACETS_CACHE_KEY: &str = "facets:enhanced:all";
const SEARCH_CACHE_PREFIX: &str = "search:";

/// Top-K candidates pulled from each retrieval arm before blending.
const CANDIDATE_K: usize = 100;
/// Candidate pool for browsing (empty-query) searches.
const BROWSE_POOL: u32 = 200;

pub const DEFAULT_PER_PAGE: u32 = 12;
pub const MAX_PER_PAGE: u32 = 50;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub q: Option<String>,
    pub canonical_term: Option<String>,
    pub primary_category: Option<String>,
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub per_page: u32,
    pub debug: bool,
    pub actor_id: Option<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            q: None,
            canonical_term: None,
            primary_category: None,
            sort_by: SortKey::Relevance,
            sort_direction: SortDirection::Desc,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            debug: false,
            actor_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i32,
    pub filename: String,
    pub size_bytes: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub canonical_terms: Vec<String>,
    pub mapping_count: usize,
    pub has_embedding: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetEntry {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facets {
    pub primary_categories: Vec<FacetEntry>,
    pub subcategories: BTreeMap<String, Vec<FacetEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub documents: Vec<DocumentSummary>,
    pub pagination: Pagination,
    pub total_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Facets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringExplanation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingStatistics {
    pub documents_with_mappings: usize,
    pub total_keyword_mappings: usize,
    pub unique_canonical_terms: usize,
    pub primary_category_distribution: BTreeMap<String, usize>,
}

/// Hybrid search over full-text, vector and taxonomy signals, with a
/// short-lived result cache and page-1 facets.
pub struct SearchService {
    documents: Arc<dyn DocumentRepository>,
    search_queries: Arc<dyn SearchQueryRepository>,
    taxonomy: Arc<TaxonomyService>,
    cache: Arc<dyn Cache>,
    gateway: Arc<AiGateway>,
    scorer: RelevanceScorer,
    search_cache_ttl: Duration,
    facet_cache_ttl: Duration,
}

impl SearchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        search_queries: Arc<dyn SearchQueryRepository>,
        taxonomy: Arc<TaxonomyService>,
        cache: Arc<dyn Cache>,
        gateway: Arc<AiGateway>,
        use_enhanced_relevance: bool,
        search_cache_ttl: Duration,
        facet_cache_ttl: Duration,
    ) -> Self {
        Self {
            documents,
            search_queries,
            taxonomy,
            cache,
            gateway,
            scorer: RelevanceScorer::new(use_enhanced_relevance),
            search_cache_ttl,
            facet_cache_ttl,
        }
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, DocumentRepositoryError> {
        let request = normalize_request(request);
        let cache_key = search_cache_key(&request);

        // Debug requests carry the scoring explanation and skip the cache
        // entirely.
        if !request.debug {
            if let Ok(Some(cached)) = self.cache.get(&cache_key).await {
                if let Ok(response) = serde_json::from_slice::<SearchResponse>(&cached) {
                    return Ok(response);
                }
            }
        }

        self.log_query(&request);

        let mut response = if request.sort_by == SortKey::Relevance {
            self.relevance_search(&request).await?
        } else {
            self.sorted_listing(&request).await?
        };

        if request.page == 1 {
            response.facets = Some(self.facets().await?);
        }

        if !request.debug {
            match serde_json::to_vec(&response) {
                Ok(bytes) => {
                    if let Err(err) = self
                        .cache
                        .set(&cache_key, &bytes, self.search_cache_ttl)
                        .await
                    {
                        warn!(error = %err, "Failed to store search result in cache");
                    }
                }
                Err(err) => warn!(error = %err, "Failed to serialize search response for cache"),
            }
        }

        Ok(response)
    }

    /// The blended scoring path behind `sort_by=relevance`.
    async fn relevance_search(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, DocumentRepositoryError> {
        let query = request.q.clone().unwrap_or_default();
        let primary_categories: HashSet<String> =
            self.taxonomy.primary_categories().into_iter().collect();
        let class = self.scorer.classify(&query, &primary_categories);
        let has_filter = request.canonical_term.is_some() || request.primary_category.is_some();
        let weights = self.scorer.weights(class, has_filter);

        let filter = DocumentFilter {
            status: Some(DocumentStatus::Completed),
            canonical_term: request.canonical_term.clone(),
            primary_category: request.primary_category.clone(),
            free_text: None,
        };

        let mut signals: HashMap<i32, RetrievalSignals> = HashMap::new();

        if class == QueryClass::Empty {
            // Browsing: no retrieval arms, candidates come straight from
            // the store ordered by recency.
            let browse = self
                .documents
                .query_documents(
                    &filter,
                    SortKey::CreatedAt,
                    SortDirection::Desc,
                    PageRequest {
                        page: 1,
                        per_page: BROWSE_POOL,
                    },
                )
                .await?;
            for doc in &browse.rows {
                signals.insert(doc.id(), RetrievalSignals::default());
            }
        } else {
            match self.gateway.embed(&query).await {
                Ok(query_vector) => {
                    let hits = self
                        .documents
                        .vector_search(&query_vector, CANDIDATE_K, &filter)
                        .await?;
                    for (id, cosine) in hits {
                        signals.entry(id).or_default().vector_score =
                            f64::from(cosine).clamp(0.0, 1.0);
                    }
                }
                Err(err) => {
                    // Degrade to text-only retrieval rather than failing
                    // the query.
                    warn!(error = %err, "Query embedding failed; vector arm skipped");
                }
            }

            let text_hits = self
                .documents
                .fulltext_search(&query, CANDIDATE_K, &filter)
                .await?;
            let top_rank = text_hits
                .first()
                .map(|(_, rank)| *rank)
                .filter(|r| *r > 0.0)
                .unwrap_or(1.0);
            for (id, rank) in text_hits {
                signals.entry(id).or_default().text_score =
                    f64::from(rank / top_rank).clamp(0.0, 1.0);
            }
        }

        let ids: Vec<i32> = signals.keys().copied().collect();
        let candidates = self.documents.find_by_ids(&ids).await?;

        let mut scored: Vec<(f64, Document)> = candidates
            .into_iter()
            .map(|doc| {
                let doc_signals = signals.get(&doc.id()).copied().unwrap_or_default();
                let score = self.scorer.score(
                    &doc,
                    doc_signals,
                    &weights,
                    &query,
                    request.canonical_term.as_deref(),
                    request.primary_category.as_deref(),
                );
                (score, doc)
            })
            .collect();

        // Ties break by recency, then id, so pagination is stable.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.created_at().cmp(&a.1.created_at()))
                .then_with(|| a.1.id().cmp(&b.1.id()))
        });

        let total = scored.len() as i64;
        let offset = ((request.page - 1) * request.per_page) as usize;
        let page_rows: Vec<DocumentSummary> = scored
            .iter()
            .skip(offset)
            .take(request.per_page as usize)
            .map(|(score, doc)| summarize(doc, Some(*score)))
            .collect();

        let scoring = if request.debug {
            Some(self.scorer.explain(class, &weights))
        } else {
            None
        };

        Ok(SearchResponse {
            documents: page_rows,
            pagination: pagination(request.page, request.per_page, total),
            total_count: total,
            facets: None,
            query: request.q.clone(),
            scoring,
        })
    }

    /// Plain sorted listing for `created_at`, `filename` and `size` sorts;
    /// sorting and pagination push down to the store.
    async fn sorted_listing(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, DocumentRepositoryError> {
        let filter = DocumentFilter {
            status: Some(DocumentStatus::Completed),
            canonical_term: request.canonical_term.clone(),
            primary_category: request.primary_category.clone(),
            free_text: request.q.clone().filter(|q| !q.trim().is_empty()),
        };

        let page = self
            .documents
            .query_documents(
                &filter,
                request.sort_by,
                request.sort_direction,
                PageRequest {
                    page: request.page,
                    per_page: request.per_page,
                },
            )
            .await?;

        Ok(SearchResponse {
            documents: page.rows.iter().map(|d| summarize(d, None)).collect(),
            pagination: pagination(request.page, request.per_page, page.total),
            total_count: page.total,
            facets: None,
            query: request.q.clone(),
            scoring: None,
        })
    }

    /// Facets for the whole completed corpus, cached for 24 hours.
    pub async fn facets(&self) -> Result<Facets, DocumentRepositoryError> {
        if let Ok(Some(cached)) = self.cache.get(FACETS_CACHE_KEY).await {
            if let Ok(facets) = serde_json::from_slice::<Facets>(&cached) {
                return Ok(facets);
            }
        }

        let counts = self.documents.facet_counts().await?;
        let mut primary: BTreeMap<String, i64> = BTreeMap::new();
        let mut subcategories: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();

        // Zero-fill from the vocabulary so empty categories still appear
        // as filter options.
        for (primary_name, subs) in self.taxonomy.hierarchy() {
            primary.entry(primary_name.clone()).or_insert(0);
            let entry = subcategories.entry(primary_name).or_default();
            for sub_name in subs.keys() {
                entry.entry(sub_name.clone()).or_insert(0);
            }
        }

        for row in counts {
            *primary.entry(row.primary_category.clone()).or_insert(0) += row.count;
            if let Some(sub) = row.subcategory {
                *subcategories
                    .entry(row.primary_category)
                    .or_default()
                    .entry(sub)
                    .or_insert(0) += row.count;
            }
        }

        let facets = Facets {
            primary_categories: primary
                .into_iter()
                .map(|(name, count)| FacetEntry { name, count })
                .collect(),
            subcategories: subcategories
                .into_iter()
                .map(|(primary_name, subs)| {
                    (
                        primary_name,
                        subs.into_iter()
                            .map(|(name, count)| FacetEntry { name, count })
                            .collect(),
                    )
                })
                .collect(),
        };

        match serde_json::to_vec(&facets) {
            Ok(bytes) => {
                if let Err(err) = self
                    .cache
                    .set(FACETS_CACHE_KEY, &bytes, self.facet_cache_ttl)
                    .await
                {
                    warn!(error = %err, "Failed to cache facets");
                }
            }
            Err(err) => warn!(error = %err, "Failed to serialize facets"),
        }

        Ok(facets)
    }

    /// Drop every cached search page and the facet aggregation. Called
    /// after any document content change commits.
    pub async fn invalidate_caches(&self) {
        if let Err(err) = self.cache.delete_prefix(SEARCH_CACHE_PREFIX).await {
            warn!(error = %err, "Failed to invalidate search cache");
        }
        if let Err(err) = self.cache.delete(FACETS_CACHE_KEY).await {
            warn!(error = %err, "Failed to invalidate facet cache");
        }
    }

    /// Filename and keyword completions for a prefix.
    pub async fn suggestions(
        &self,
        partial: &str,
        limit: usize,
    ) -> Result<Vec<String>, DocumentRepositoryError> {
        let needle = partial.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let pool = self
            .documents
            .query_documents(
                &DocumentFilter {
                    status: Some(DocumentStatus::Completed),
                    ..Default::default()
                },
                SortKey::CreatedAt,
                SortDirection::Desc,
                PageRequest {
                    page: 1,
                    per_page: 50,
                },
            )
            .await?;

        let mut suggestions: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for doc in &pool.rows {
            if doc.filename().to_lowercase().contains(&needle)
                && seen.insert(doc.filename().to_string())
            {
                suggestions.push(doc.filename().to_string());
            }
            for keyword in doc.keywords() {
                if keyword.to_lowercase().contains(&needle) && seen.insert(keyword.clone()) {
                    suggestions.push(keyword.clone());
                }
            }
        }

        suggestions.truncate(limit);
        Ok(suggestions)
    }

    pub async fn top_queries(&self, limit: usize) -> Vec<TopQuery> {
        let since = Utc::now() - chrono::Duration::days(7);
        match self.search_queries.top_queries(since, limit).await {
            Ok(top) => top,
            Err(err) => {
                warn!(error = %err, "Failed to aggregate top queries");
                Vec::new()
            }
        }
    }

    /// Corpus-wide keyword-mapping aggregates.
    pub async fn mapping_statistics(&self) -> Result<MappingStatistics, DocumentRepositoryError> {
        let pool = self
            .documents
            .query_documents(
                &DocumentFilter {
                    status: Some(DocumentStatus::Completed),
                    ..Default::default()
                },
                SortKey::CreatedAt,
                SortDirection::Desc,
                PageRequest {
                    page: 1,
                    per_page: 500,
                },
            )
            .await?;

        let mut stats = MappingStatistics::default();
        let mut canonical: HashSet<String> = HashSet::new();

        for doc in &pool.rows {
            let count = doc.mapping_count();
            if count == 0 {
                continue;
            }
            stats.documents_with_mappings += 1;
            stats.total_keyword_mappings += count;
            if let Some(analysis) = doc.ai_analysis() {
                for mapping in &analysis.keyword_mappings {
                    if let Some(term) = &mapping.mapped_canonical_term {
                        canonical.insert(term.clone());
                    }
                    if let Some(category) = &mapping.mapped_primary_category {
                        *stats
                            .primary_category_distribution
                            .entry(category.clone())
                            .or_default() += 1;
                    }
                }
            }
        }

        stats.unique_canonical_terms = canonical.len();
        Ok(stats)
    }

    /// Fire-and-forget analytics. Never fails the query.
    fn log_query(&self, request: &SearchRequest) {
        let Some(query) = request.q.clone().filter(|q| !q.trim().is_empty()) else {
            return;
        };
        let actor = request.actor_id.clone();
        let repository = self.search_queries.clone();
        tokio::spawn(async move {
            if let Err(err) = repository.record(&query, actor.as_deref()).await {
                warn!(error = %err, "Failed to record search query");
            } else {
                info!(query = %query, "Search query recorded");
            }
        });
    }
}

fn normalize_request(request: &SearchRequest) -> SearchRequest {
    let mut normalized = request.clone();
    normalized.page = normalized.page.max(1);
    normalized.per_page = normalized.per_page.clamp(1, MAX_PER_PAGE);
    normalized.q = normalized
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    normalized
}

fn pagination(page: u32, per_page: u32, total: i64) -> Pagination {
    let has_next = (page as i64) * (per_page as i64) < total;
    Pagination {
        page,
        per_page,
        total,
        has_next,
    }
}

/// Stable cache key over the normalized request.
fn search_cache_key(request: &SearchRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.q.as_deref().unwrap_or("").to_lowercase());
    hasher.update([0u8]);
    hasher.update(request.canonical_term.as_deref().unwrap_or(""));
    hasher.update([0u8]);
    hasher.update(request.primary_category.as_deref().unwrap_or(""));
    hasher.update([0u8]);
    hasher.update(format!(
        "{:?}:{:?}:{}:{}",
        request.sort_by, request.sort_direction, request.page, request.per_page
    ));
    format!("{}{:x}", SEARCH_CACHE_PREFIX, hasher.finalize())
}

fn summarize(document: &Document, relevance: Option<f64>) -> DocumentSummary {
    let categories = document
        .ai_analysis()
        .map(|a| {
            let mut cats: Vec<String> = a
                .categories
                .iter()
                .cloned()
                .chain(
                    a.keyword_mappings
                        .iter()
                        .filter_map(|m| m.mapped_primary_category.clone()),
                )
                .collect();
            cats.sort();
            cats.dedup();
            cats
        })
        .unwrap_or_default();

    DocumentSummary {
        id: document.id(),
        filename: document.filename().to_string(),
        size_bytes: document.size_bytes(),
        status: document.status().to_string(),
        created_at: document.created_at(),
        summary: document.summary().map(|s| s.to_string()),
        categories,
        keywords: document.keywords().iter().take(10).cloned().collect(),
        canonical_terms: document.canonical_terms().into_iter().take(5).collect(),
        mapping_count: document.mapping_count(),
        has_embedding: document.search_vector().is_some(),
        relevance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(q: Option<&str>, page: u32) -> SearchRequest {
        SearchRequest {
            q: q.map(|s| s.to_string()),
            page,
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_key_is_stable_and_normalized() {
        let a = search_cache_key(&normalize_request(&request_with(Some("Healthcare"), 1)));
        let b = search_cache_key(&normalize_request(&request_with(Some("  healthcare "), 1)));
        assert_eq!(a, b);

        let c = search_cache_key(&normalize_request(&request_with(Some("healthcare"), 2)));
        assert_ne!(a, c);

        assert!(a.starts_with(SEARCH_CACHE_PREFIX));
    }

    #[test]
    fn test_pagination_has_next() {
        let p = pagination(1, 12, 25);
        assert!(p.has_next);
        let last = pagination(3, 12, 25);
        assert!(!last.has_next);
        let empty = pagination(1, 12, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_normalize_request_clamps_bounds() {
        let mut request = SearchRequest {
            per_page: 500,
            page: 0,
            q: Some("   ".to_string()),
            ..Default::default()
        };
        let normalized = normalize_request(&request);
        assert_eq!(normalized.per_page, MAX_PER_PAGE);
        assert_eq!(normalized.page, 1);
        assert_eq!(normalized.q, None);

        request.per_page = 0;
        assert_eq!(normalize_request(&request).per_page, 1);
    }
}
