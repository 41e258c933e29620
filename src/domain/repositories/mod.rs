pub mod document_repository;
pub mod search_query_repository;
pub mod taxonomy_repository;

pub use document_repository::{
    DocumentFilter, DocumentPage, DocumentRepository, DocumentRepositoryError, FacetCount,
    PageRequest, SortDirection, SortKey,
};
pub use search_query_repository::{SearchQueryRepository, SearchQueryRepositoryError};
pub use taxonomy_repository::{TaxonomyRepository, TaxonomyRepositoryError, UpsertCounts};
