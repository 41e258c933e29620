use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{AiAnalysis, Document};
use crate::domain::value_objects::DocumentStatus;

#[derive(Debug)]
pub enum DocumentRepositoryError {
    NotFound(i32),
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
    ConflictingState(String),
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },
    DatabaseError(String),
    ValidationError(String),
}

impl std::fmt::Display for DocumentRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentRepositoryError::NotFound(id) => write!(f, "Document not found: {}", id),
            DocumentRepositoryError::InvalidTransition { from, to } => {
                write!(f, "Invalid status transition: {} -> {}", from, to)
            }
            DocumentRepositoryError::ConflictingState(msg) => {
                write!(f, "Conflicting state: {}", msg)
            }
            DocumentRepositoryError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Embedding dimension mismatch: expected {}, got {}",
                    expected, actual
                )
            }
            DocumentRepositoryError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            DocumentRepositoryError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for DocumentRepositoryError {}

/// Predicates applied to document queries and search candidate sets.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub canonical_term: Option<String>,
    pub primary_category: Option<String>,
    pub free_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Relevance,
    CreatedAt,
    Filename,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }
}

#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub rows: Vec<Document>,
    pub total: i64,
}

/// One facet axis bucket: primary category, optional subcategory, and the
/// number of completed documents mapped underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetCount {
    pub primary_category: String,
    pub subcategory: Option<String>,
    pub count: i64,
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(
        &self,
        filename: &str,
        blob_key: &str,
        size_bytes: Option<i64>,
    ) -> Result<Document, DocumentRepositoryError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Document>, DocumentRepositoryError>;

    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<Document>, DocumentRepositoryError>;

    /// Atomic status change. Rejects transitions the state machine does not
    /// allow with `InvalidTransition`, without mutating the row.
    async fn update_status(
        &self,
        id: i32,
        status: DocumentStatus,
        progress: Option<i32>,
        error: Option<String>,
    ) -> Result<(), DocumentRepositoryError>;

    /// Persist the analysis results. The full-text index column re-derives
    /// from `filename || ' ' || extracted_text` inside the store.
    async fn update_content(
        &self,
        id: i32,
        extracted_text: &str,
        ai_analysis: &AiAnalysis,
        keywords: &[String],
        metadata: Option<&serde_json::Value>,
        preview_key: Option<&str>,
    ) -> Result<(), DocumentRepositoryError>;

    async fn update_embedding(
        &self,
        id: i32,
        vector: &[f32],
    ) -> Result<(), DocumentRepositoryError>;

    async fn update_preview_key(
        &self,
        id: i32,
        preview_key: &str,
    ) -> Result<(), DocumentRepositoryError>;

    /// Clear derived fields and taxonomy mappings, rewind to QUEUED.
    /// Idempotent; rejected with `ConflictingState` while a worker holds
    /// the processing lease.
    async fn reset_for_reprocessing(&self, id: i32) -> Result<(), DocumentRepositoryError>;

    async fn delete(&self, id: i32) -> Result<bool, DocumentRepositoryError>;

    async fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort: SortKey,
        direction: SortDirection,
        page: PageRequest,
    ) -> Result<DocumentPage, DocumentRepositoryError>;

    /// Approximate nearest neighbours by cosine distance. Returns
    /// `(document_id, cosine_similarity)` pairs, best first.
    async fn vector_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i32, f32)>, DocumentRepositoryError>;

    /// Language-aware full-text rank over the derived index. Returns
    /// `(document_id, rank)` pairs, best first.
    async fn fulltext_search(
        &self,
        query_text: &str,
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i32, f32)>, DocumentRepositoryError>;

    /// Replace the taxonomy associations for a document with the given
    /// term ids.
    async fn replace_taxonomy_mappings(
        &self,
        document_id: i32,
        term_ids: &[i32],
    ) -> Result<(), DocumentRepositoryError>;

    async fn taxonomy_term_ids(
        &self,
        document_id: i32,
    ) -> Result<Vec<i32>, DocumentRepositoryError>;

    /// Completed-document counts along the primary-category/subcategory
    /// axes, for facet generation.
    async fn facet_counts(&self) -> Result<Vec<FacetCount>, DocumentRepositoryError>;

    /// Documents sitting in one of `statuses` with no update since
    /// `older_than`; the sweeper re-enqueues these.
    async fn find_stale(
        &self,
        statuses: &[DocumentStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Document>, DocumentRepositoryError>;
}
