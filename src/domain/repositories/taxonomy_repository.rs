use async_trait::async_trait;

use crate::domain::entities::{TaxonomySourceRow, TaxonomySynonym, TaxonomyTerm};

#[derive(Debug)]
pub enum TaxonomyRepositoryError {
    DatabaseError(String),
    ValidationError(String),
    CycleDetected(String),
}

impl std::fmt::Display for TaxonomyRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaxonomyRepositoryError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            TaxonomyRepositoryError::ValidationError(msg) => {
                write!(f, "Validation error: {}", msg)
            }
            TaxonomyRepositoryError::CycleDetected(term) => {
                write!(f, "Cycle detected in taxonomy parent relation at: {}", term)
            }
        }
    }
}

impl std::error::Error for TaxonomyRepositoryError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub terms_created: usize,
    pub synonyms_created: usize,
}

#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    /// Idempotent bulk load: creates missing terms and synonyms, leaves
    /// existing rows untouched.
    async fn bulk_upsert(
        &self,
        rows: &[TaxonomySourceRow],
    ) -> Result<UpsertCounts, TaxonomyRepositoryError>;

    /// Full vocabulary, for the in-memory snapshot.
    async fn load_all(
        &self,
    ) -> Result<(Vec<TaxonomyTerm>, Vec<TaxonomySynonym>), TaxonomyRepositoryError>;

    /// Atomic upsert of a single term.
    async fn find_or_create(
        &self,
        term: &str,
        primary_category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<TaxonomyTerm, TaxonomyRepositoryError>;
}
