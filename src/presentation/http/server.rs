use axum::middleware;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::presentation::http::handlers::{
    AuthHandler, DocumentHandler, HealthHandler, SearchHandler, TaxonomyHandler,
};
use crate::presentation::http::middleware::{
    require_auth_middleware, session_middleware, SessionLayerState,
};
use crate::presentation::http::routes::{
    auth_routes, document_routes, health_routes, search_routes, taxonomy_routes,
};

pub struct HttpServer {
    document_handler: Arc<DocumentHandler>,
    search_handler: Arc<SearchHandler>,
    taxonomy_handler: Arc<TaxonomyHandler>,
    auth_handler: Arc<AuthHandler>,
    health_handler: Arc<HealthHandler>,
    session_state: SessionLayerState,
    body_limit_bytes: usize,
    port: u16,
}

impl HttpServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_handler: Arc<DocumentHandler>,
        search_handler: Arc<SearchHandler>,
        taxonomy_handler: Arc<TaxonomyHandler>,
        auth_handler: Arc<AuthHandler>,
        health_handler: Arc<HealthHandler>,
        session_state: SessionLayerState,
        body_limit_bytes: usize,
        port: u16,
    ) -> Self {
        Self {
            document_handler,
            search_handler,
            taxonomy_handler,
            auth_handler,
            health_handler,
            session_state,
            body_limit_bytes,
            port,
        }
    }

    pub fn router(&self) -> Router {
        // Upload and reprocess live here; everything in this group needs a
        // valid authenticated session.
        let protected = Router::new()
            .merge(document_routes(self.document_handler.clone()))
            .merge(search_routes(self.search_handler.clone()))
            .merge(taxonomy_routes(self.taxonomy_handler.clone()))
            .layer(middleware::from_fn_with_state(
                self.session_state.clone(),
                require_auth_middleware,
            ));

        let public = Router::new()
            .merge(health_routes(self.health_handler.clone()))
            .merge(auth_routes(self.auth_handler.clone()));

        Router::new()
            .merge(protected)
            .merge(public)
            .layer(middleware::from_fn_with_state(
                self.session_state.clone(),
                session_middleware,
            ))
            .layer(RequestBodyLimitLayer::new(self.body_limit_bytes))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "HTTP server listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        Ok(())
    }
}
