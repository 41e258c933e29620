pub mod document_model;
pub mod search_query_model;
pub mod taxonomy_model;

pub use document_model::{DocumentModel, NewDocumentModel};
pub use search_query_model::{NewSearchQueryModel, SearchQueryModel};
pub use taxonomy_model::{
    NewTaxonomySynonymModel, NewTaxonomyTermModel, TaxonomySynonymModel, TaxonomyTermModel,
};
