pub mod auth_handler;
pub mod document_handler;
pub mod health_handler;
pub mod search_handler;
pub mod taxonomy_handler;

pub use auth_handler::AuthHandler;
pub use document_handler::DocumentHandler;
pub use health_handler::HealthHandler;
pub use search_handler::SearchHandler;
pub use taxonomy_handler::TaxonomyHandler;
