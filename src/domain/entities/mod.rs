pub mod analysis;
pub mod document;
pub mod search_query;
pub mod taxonomy;

pub use analysis::{AiAnalysis, KeywordMapping};
pub use document::Document;
pub use search_query::{SearchQuery, TopQuery};
pub use taxonomy::{TaxonomySourceRow, TaxonomyStatistics, TaxonomySynonym, TaxonomyTerm};
