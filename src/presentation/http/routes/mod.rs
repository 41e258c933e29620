pub mod auth_routes;
pub mod document_routes;
pub mod health_routes;
pub mod search_routes;
pub mod taxonomy_routes;

pub use auth_routes::auth_routes;
pub use document_routes::document_routes;
pub use health_routes::health_routes;
pub use search_routes::search_routes;
pub use taxonomy_routes::taxonomy_routes;
