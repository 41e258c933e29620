//! Shared in-memory test doubles: repositories over plain maps, scripted
//! AI providers, and fixture helpers.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use archivum::application::ports::ai_provider::{
    AiProvider, AiProviderError, AnalysisPrompt, CapabilitySet,
};
use archivum::domain::entities::{
    AiAnalysis, Document, TaxonomySourceRow, TaxonomySynonym, TaxonomyTerm, TopQuery,
};
use archivum::domain::repositories::document_repository::{
    DocumentFilter, DocumentPage, DocumentRepository, DocumentRepositoryError, FacetCount,
    PageRequest, SortDirection, SortKey,
};
use archivum::domain::repositories::search_query_repository::{
    SearchQueryRepository, SearchQueryRepositoryError,
};
use archivum::domain::repositories::taxonomy_repository::{
    TaxonomyRepository, TaxonomyRepositoryError, UpsertCounts,
};
use archivum::domain::value_objects::{DocumentStatus, FileKind};

pub const TEST_VECTOR_DIM: usize = 8;

pub fn test_vector(seed: f32) -> Vec<f32> {
    (0..TEST_VECTOR_DIM).map(|i| seed + i as f32 * 0.01).collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ---------------------------------------------------------------------------
// Document repository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DocumentState {
    next_id: i32,
    documents: BTreeMap<i32, Document>,
    mappings: HashMap<i32, BTreeSet<i32>>,
    /// `(status, progress)` after every status write, for milestone
    /// assertions.
    history: HashMap<i32, Vec<(DocumentStatus, i32)>>,
}

pub struct InMemoryDocumentRepository {
    state: Mutex<DocumentState>,
    terms: Mutex<Vec<TaxonomyTerm>>,
    vector_dim: usize,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DocumentState::default()),
            terms: Mutex::new(Vec::new()),
            vector_dim: TEST_VECTOR_DIM,
        }
    }

    /// Term metadata used for canonical/primary filtering and facets.
    pub fn set_terms(&self, terms: Vec<TaxonomyTerm>) {
        *self.terms.lock().unwrap() = terms;
    }

    pub fn status_history(&self, id: i32) -> Vec<(DocumentStatus, i32)> {
        self.state
            .lock()
            .unwrap()
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed_document(&self, document: Document) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(document.id());
        state.documents.insert(document.id(), document);
    }

    fn term_ids_matching(
        &self,
        canonical: Option<&str>,
        primary: Option<&str>,
    ) -> Option<BTreeSet<i32>> {
        if canonical.is_none() && primary.is_none() {
            return None;
        }
        let terms = self.terms.lock().unwrap();
        let matching: BTreeSet<i32> = terms
            .iter()
            .filter(|t| {
                let canonical_hit = canonical
                    .map(|c| t.term.eq_ignore_ascii_case(c))
                    .unwrap_or(true);
                let primary_hit = primary
                    .map(|p| {
                        t.primary_category
                            .as_deref()
                            .map(|tp| tp.eq_ignore_ascii_case(p))
                            .unwrap_or(false)
                    })
                    .unwrap_or(true);
                canonical_hit && primary_hit
            })
            .map(|t| t.id)
            .collect();
        Some(matching)
    }

    fn passes_filter(&self, state: &DocumentState, doc: &Document, filter: &DocumentFilter) -> bool {
        if let Some(status) = filter.status {
            if doc.status() != status {
                return false;
            }
        }

        if let Some(matching) = self.term_ids_matching(
            filter.canonical_term.as_deref(),
            filter.primary_category.as_deref(),
        ) {
            let doc_terms = state.mappings.get(&doc.id());
            let hit = doc_terms
                .map(|ids| ids.iter().any(|id| matching.contains(id)))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }

        if let Some(text) = &filter.free_text {
            let haystack = format!(
                "{} {}",
                doc.filename().to_lowercase(),
                doc.extracted_text().unwrap_or("").to_lowercase()
            );
            let any = text
                .to_lowercase()
                .split_whitespace()
                .any(|token| haystack.contains(token));
            if !any {
                return false;
            }
        }

        true
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn create(
        &self,
        filename: &str,
        blob_key: &str,
        size_bytes: Option<i64>,
    ) -> Result<Document, DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();

        let document = Document::from_database(
            id,
            filename.to_string(),
            blob_key.to_string(),
            size_bytes,
            DocumentStatus::Pending,
            0,
            None,
            now,
            now,
            None,
            None,
            None,
            Vec::new(),
            None,
            None,
            None,
        );
        state.documents.insert(id, document.clone());
        state
            .history
            .entry(id)
            .or_default()
            .push((DocumentStatus::Pending, 0));
        Ok(document)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Document>, DocumentRepositoryError> {
        Ok(self.state.lock().unwrap().documents.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<Document>, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.documents.get(id).cloned())
            .collect())
    }

    async fn update_status(
        &self,
        id: i32,
        status: DocumentStatus,
        progress: Option<i32>,
        error: Option<String>,
    ) -> Result<(), DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or(DocumentRepositoryError::NotFound(id))?;

        let from = document.status();
        if !document.apply_status(status, progress, error).is_ok() {
            return Err(DocumentRepositoryError::InvalidTransition { from, to: status });
        }
        let recorded = (document.status(), document.progress());
        state.history.entry(id).or_default().push(recorded);
        Ok(())
    }

    async fn update_content(
        &self,
        id: i32,
        extracted_text: &str,
        ai_analysis: &AiAnalysis,
        keywords: &[String],
        metadata: Option<&serde_json::Value>,
        preview_key: Option<&str>,
    ) -> Result<(), DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or(DocumentRepositoryError::NotFound(id))?;
        document.set_content(
            extracted_text.to_string(),
            ai_analysis.clone(),
            keywords.to_vec(),
            metadata.cloned(),
            preview_key.map(|k| k.to_string()),
        );
        Ok(())
    }

    async fn update_embedding(
        &self,
        id: i32,
        vector: &[f32],
    ) -> Result<(), DocumentRepositoryError> {
        if vector.len() != self.vector_dim {
            return Err(DocumentRepositoryError::DimensionMismatch {
                expected: self.vector_dim,
                actual: vector.len(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or(DocumentRepositoryError::NotFound(id))?;
        document.set_embedding(vector.to_vec());
        Ok(())
    }

    async fn update_preview_key(
        &self,
        id: i32,
        preview_key: &str,
    ) -> Result<(), DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or(DocumentRepositoryError::NotFound(id))?;
        document.set_preview_key(preview_key.to_string());
        Ok(())
    }

    async fn reset_for_reprocessing(&self, id: i32) -> Result<(), DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or(DocumentRepositoryError::NotFound(id))?;
        if !document.status().can_reset_for_reprocessing() {
            return Err(DocumentRepositoryError::ConflictingState(
                "Document is being processed".to_string(),
            ));
        }
        document.reset_for_reprocessing();
        state.mappings.remove(&id);
        state
            .history
            .entry(id)
            .or_default()
            .push((DocumentStatus::Queued, 0));
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<bool, DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.mappings.remove(&id);
        Ok(state.documents.remove(&id).is_some())
    }

    async fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort: SortKey,
        direction: SortDirection,
        page: PageRequest,
    ) -> Result<DocumentPage, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<Document> = state
            .documents
            .values()
            .filter(|doc| self.passes_filter(&state, doc, filter))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = match sort {
                SortKey::Filename => a.filename().cmp(b.filename()),
                SortKey::Size => a.size_bytes().cmp(&b.size_bytes()),
                _ => a
                    .created_at()
                    .cmp(&b.created_at())
                    .then_with(|| a.id().cmp(&b.id())),
            };
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect();
        Ok(DocumentPage { rows, total })
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i32, f32)>, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        let completed = DocumentFilter {
            status: Some(DocumentStatus::Completed),
            ..filter.clone()
        };

        let mut hits: Vec<(i32, f32)> = state
            .documents
            .values()
            .filter(|doc| self.passes_filter(&state, doc, &completed))
            .filter_map(|doc| {
                doc.search_vector()
                    .map(|v| (doc.id(), cosine(v, query_vector)))
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn fulltext_search(
        &self,
        query_text: &str,
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i32, f32)>, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        let completed = DocumentFilter {
            status: Some(DocumentStatus::Completed),
            ..filter.clone()
        };
        let tokens: Vec<String> = query_text
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(i32, f32)> = state
            .documents
            .values()
            .filter(|doc| self.passes_filter(&state, doc, &completed))
            .filter_map(|doc| {
                let haystack = format!(
                    "{} {}",
                    doc.filename().to_lowercase(),
                    doc.extracted_text().unwrap_or("").to_lowercase()
                );
                let matched = tokens.iter().filter(|t| haystack.contains(*t)).count();
                if matched == 0 {
                    None
                } else {
                    Some((doc.id(), matched as f32 / tokens.len() as f32))
                }
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn replace_taxonomy_mappings(
        &self,
        document_id: i32,
        term_ids: &[i32],
    ) -> Result<(), DocumentRepositoryError> {
        let mut state = self.state.lock().unwrap();
        state
            .mappings
            .insert(document_id, term_ids.iter().copied().collect());
        Ok(())
    }

    async fn taxonomy_term_ids(
        &self,
        document_id: i32,
    ) -> Result<Vec<i32>, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .mappings
            .get(&document_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn facet_counts(&self) -> Result<Vec<FacetCount>, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        let terms = self.terms.lock().unwrap();
        let by_id: HashMap<i32, &TaxonomyTerm> = terms.iter().map(|t| (t.id, t)).collect();

        let mut counts: BTreeMap<(String, Option<String>), i64> = BTreeMap::new();
        for (doc_id, term_ids) in &state.mappings {
            let completed = state
                .documents
                .get(doc_id)
                .map(|d| d.status() == DocumentStatus::Completed)
                .unwrap_or(false);
            if !completed {
                continue;
            }
            for term_id in term_ids {
                if let Some(term) = by_id.get(term_id) {
                    if let Some(primary) = &term.primary_category {
                        *counts
                            .entry((primary.clone(), term.subcategory.clone()))
                            .or_default() += 1;
                    }
                }
            }
        }

        Ok(counts
            .into_iter()
            .map(|((primary_category, subcategory), count)| FacetCount {
                primary_category,
                subcategory,
                count,
            })
            .collect())
    }

    async fn find_stale(
        &self,
        statuses: &[DocumentStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Document>, DocumentRepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .values()
            .filter(|doc| statuses.contains(&doc.status()) && doc.updated_at() < older_than)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Taxonomy repository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TaxonomyState {
    next_term_id: i32,
    next_synonym_id: i32,
    terms: Vec<TaxonomyTerm>,
    synonyms: Vec<TaxonomySynonym>,
}

#[derive(Default)]
pub struct InMemoryTaxonomyRepository {
    state: Mutex<TaxonomyState>,
}

impl InMemoryTaxonomyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terms(&self) -> Vec<TaxonomyTerm> {
        self.state.lock().unwrap().terms.clone()
    }
}

#[async_trait]
impl TaxonomyRepository for InMemoryTaxonomyRepository {
    async fn bulk_upsert(
        &self,
        rows: &[TaxonomySourceRow],
    ) -> Result<UpsertCounts, TaxonomyRepositoryError> {
        let mut state = self.state.lock().unwrap();
        let mut counts = UpsertCounts::default();

        for row in rows {
            let term_id = match state
                .terms
                .iter()
                .find(|t| t.term == row.term)
                .map(|t| t.id)
            {
                Some(id) => id,
                None => {
                    state.next_term_id += 1;
                    let id = state.next_term_id;
                    state.terms.push(TaxonomyTerm {
                        id,
                        term: row.term.clone(),
                        primary_category: Some(row.primary_category.clone()),
                        subcategory: row.subcategory.clone(),
                        description: None,
                        parent_id: None,
                    });
                    counts.terms_created += 1;
                    id
                }
            };

            for synonym in &row.synonyms {
                let exists = state
                    .synonyms
                    .iter()
                    .any(|s| s.term_id == term_id && s.synonym == *synonym);
                if !exists {
                    state.next_synonym_id += 1;
                    let id = state.next_synonym_id;
                    state.synonyms.push(TaxonomySynonym {
                        id,
                        term_id,
                        synonym: synonym.clone(),
                    });
                    counts.synonyms_created += 1;
                }
            }
        }

        Ok(counts)
    }

    async fn load_all(
        &self,
    ) -> Result<(Vec<TaxonomyTerm>, Vec<TaxonomySynonym>), TaxonomyRepositoryError> {
        let state = self.state.lock().unwrap();
        Ok((state.terms.clone(), state.synonyms.clone()))
    }

    async fn find_or_create(
        &self,
        term: &str,
        primary_category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<TaxonomyTerm, TaxonomyRepositoryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.terms.iter().find(|t| t.term == term) {
            return Ok(existing.clone());
        }

        state.next_term_id += 1;
        let created = TaxonomyTerm {
            id: state.next_term_id,
            term: term.to_string(),
            primary_category: primary_category.map(|s| s.to_string()),
            subcategory: subcategory.map(|s| s.to_string()),
            description: None,
            parent_id: None,
        };
        state.terms.push(created.clone());
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Search query repository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySearchQueryRepository {
    records: Mutex<Vec<(String, Option<String>, DateTime<Utc>)>>,
}

impl InMemorySearchQueryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _, _)| q.clone())
            .collect()
    }
}

#[async_trait]
impl SearchQueryRepository for InMemorySearchQueryRepository {
    async fn record(
        &self,
        query_text: &str,
        actor_id: Option<&str>,
    ) -> Result<(), SearchQueryRepositoryError> {
        self.records.lock().unwrap().push((
            query_text.to_string(),
            actor_id.map(|s| s.to_string()),
            Utc::now(),
        ));
        Ok(())
    }

    async fn top_queries(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopQuery>, SearchQueryRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for (query, _, at) in records.iter() {
            if *at >= since {
                *counts.entry(query.clone()).or_default() += 1;
            }
        }
        let mut top: Vec<TopQuery> = counts
            .into_iter()
            .map(|(query_text, count)| TopQuery { query_text, count })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then(a.query_text.cmp(&b.query_text)));
        top.truncate(limit);
        Ok(top)
    }
}

// ---------------------------------------------------------------------------
// Scripted AI provider
// ---------------------------------------------------------------------------

/// Provider double whose three operations return fixed values, with an
/// optional count of leading failures.
pub struct StubProvider {
    pub provider_name: String,
    pub capabilities: CapabilitySet,
    pub extract_response: String,
    pub analyze_response: String,
    pub embed_response: Vec<f32>,
    pub failure: Option<AiProviderError>,
    pub fail_first: u32,
    calls: AtomicU32,
}

impl StubProvider {
    pub fn healthy(name: &str) -> Self {
        Self {
            provider_name: name.to_string(),
            capabilities: CapabilitySet {
                extract: true,
                analyze: true,
                embed: true,
            },
            extract_response: "Quarterly report on healthcare policy".to_string(),
            analyze_response: serde_json::json!({
                "summary": "Quarterly healthcare report",
                "categories": ["Healthcare"],
                "keyword_mappings": [{
                    "verbatim_term": "healthcare policy",
                    "mapped_canonical_term": "Healthcare Policy"
                }]
            })
            .to_string(),
            embed_response: test_vector(0.5),
            failure: None,
            fail_first: 0,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(name: &str, error: AiProviderError) -> Self {
        let mut provider = Self::healthy(name);
        provider.failure = Some(error);
        provider
    }

    /// Fails the first `n` calls, then behaves.
    pub fn flaky(name: &str, error: AiProviderError, n: u32) -> Self {
        let mut provider = Self::healthy(name);
        provider.failure = Some(error);
        provider.fail_first = n;
        provider
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), AiProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            if self.fail_first == 0 || call < self.fail_first {
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AiProvider for StubProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    async fn extract_text(&self, _data: &[u8], _kind: FileKind) -> Result<String, AiProviderError> {
        self.maybe_fail()?;
        Ok(self.extract_response.clone())
    }

    async fn analyze(&self, _prompt: &AnalysisPrompt) -> Result<String, AiProviderError> {
        self.maybe_fail()?;
        Ok(self.analyze_response.clone())
    }

    async fn embed(&self, _text: &str, _dim: usize) -> Result<Vec<f32>, AiProviderError> {
        self.maybe_fail()?;
        Ok(self.embed_response.clone())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn healthcare_taxonomy() -> Vec<TaxonomySourceRow> {
    vec![
        TaxonomySourceRow {
            primary_category: "Healthcare".to_string(),
            subcategory: Some("Policy".to_string()),
            term: "Healthcare Policy".to_string(),
            synonyms: vec!["health care policy".to_string(), "medical policy".to_string()],
        },
        TaxonomySourceRow {
            primary_category: "Healthcare".to_string(),
            subcategory: Some("Access".to_string()),
            term: "Medicaid Expansion".to_string(),
            synonyms: vec![],
        },
        TaxonomySourceRow {
            primary_category: "Economy".to_string(),
            subcategory: None,
            term: "Taxes".to_string(),
            synonyms: vec!["taxation".to_string()],
        },
    ]
}

pub fn completed_document(
    id: i32,
    filename: &str,
    canonical: &str,
    primary: &str,
    vector: Vec<f32>,
    text: &str,
) -> Document {
    use archivum::domain::entities::KeywordMapping;
    let now = Utc::now();
    let analysis = AiAnalysis {
        summary: Some(format!("Summary of {}", filename)),
        categories: vec![primary.to_string()],
        keyword_mappings: vec![KeywordMapping {
            verbatim_term: canonical.to_lowercase(),
            mapped_canonical_term: Some(canonical.to_string()),
            mapped_primary_category: Some(primary.to_string()),
            mapped_subcategory: None,
        }],
        ..Default::default()
    };
    let keywords = analysis.keyword_list();

    Document::from_database(
        id,
        filename.to_string(),
        format!("uploads/{}/{}", id, filename),
        Some(1024),
        DocumentStatus::Completed,
        100,
        None,
        now,
        now,
        Some(now),
        Some(text.to_string()),
        Some(analysis),
        keywords,
        None,
        Some(vector),
        None,
    )
}
