pub mod postgres_document_repository;
pub mod postgres_search_query_repository;
pub mod postgres_taxonomy_repository;

pub use postgres_document_repository::PostgresDocumentRepository;
pub use postgres_search_query_repository::PostgresSearchQueryRepository;
pub use postgres_taxonomy_repository::PostgresTaxonomyRepository;
