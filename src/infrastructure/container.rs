use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::application::ports::{AiProvider, BlobStore, Cache, JobQueue, PreviewRenderer};
use crate::application::services::{
    AiGateway, SearchService, SessionService, TaxonomyService,
};
use crate::application::use_cases::{
    DeleteDocumentUseCase, ReprocessDocumentUseCase, UploadDocumentsUseCase,
};
use crate::config::Config;
use crate::domain::repositories::{DocumentRepository, SearchQueryRepository, TaxonomyRepository};
use crate::infrastructure::ai::{AnthropicProvider, GeminiProvider, OpenAiProvider};
use crate::infrastructure::blob::LocalBlobStore;
use crate::infrastructure::cache::{MemoryCache, RedisCache};
use crate::infrastructure::database::repositories::{
    PostgresDocumentRepository, PostgresSearchQueryRepository, PostgresTaxonomyRepository,
};
use crate::infrastructure::database::{create_connection_pool, run_migrations};
use crate::infrastructure::messaging::{Enqueuer, Scheduler, WorkerConfig, WorkerPool};
use crate::infrastructure::preview::PassthroughPreviewRenderer;
use crate::presentation::http::handlers::{
    AuthHandler, DocumentHandler, HealthHandler, SearchHandler, TaxonomyHandler,
};
use crate::presentation::http::middleware::{LoginRateLimiter, SessionLayerState};
use crate::presentation::http::HttpServer;

/// Wires the whole system together from configuration.
pub struct AppContainer {
    pub config: Config,
    pub worker_pool: Arc<WorkerPool>,
    pub scheduler: Arc<Scheduler>,

    document_handler: Arc<DocumentHandler>,
    search_handler: Arc<SearchHandler>,
    taxonomy_handler: Arc<TaxonomyHandler>,
    auth_handler: Arc<AuthHandler>,
    health_handler: Arc<HealthHandler>,
    session_state: SessionLayerState,
}

impl AppContainer {
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        // Store
        let pool = create_connection_pool(&config.database_url, config.db_pool_size)?;
        run_migrations(&pool)?;

        let documents: Arc<dyn DocumentRepository> = Arc::new(PostgresDocumentRepository::new(
            pool.clone(),
            config.vector_dim,
        ));
        let taxonomy_repository: Arc<dyn TaxonomyRepository> =
            Arc::new(PostgresTaxonomyRepository::new(pool.clone()));
        let search_queries: Arc<dyn SearchQueryRepository> =
            Arc::new(PostgresSearchQueryRepository::new(pool));

        // Cache/Broker; a dead Redis degrades to process-local storage so
        // the service still comes up.
        let (cache, queue): (Arc<dyn Cache>, Arc<dyn JobQueue>) =
            match RedisCache::connect(&config.redis_url).await {
                Ok(redis) => (Arc::new(redis.clone()), Arc::new(redis)),
                Err(err) => {
                    warn!(error = %err, "Redis unreachable at startup; using in-process cache and queue");
                    let memory = Arc::new(MemoryCache::new());
                    (memory.clone() as Arc<dyn Cache>, memory as Arc<dyn JobQueue>)
                }
            };

        // Blob store
        let blobs: Arc<dyn BlobStore> =
            Arc::new(LocalBlobStore::new(PathBuf::from(&config.blob_root)));

        // AI gateway with the configured provider order
        let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();
        for name in &config.ai_provider_order {
            match name.as_str() {
                "anthropic" => {
                    if let Some(key) = &config.anthropic_api_key {
                        providers.push(Arc::new(AnthropicProvider::new(key.clone())?));
                    }
                }
                "openai" => {
                    if let Some(key) = &config.openai_api_key {
                        providers.push(Arc::new(OpenAiProvider::new(key.clone())?));
                    }
                }
                "gemini" => {
                    if let Some(key) = &config.gemini_api_key {
                        providers.push(Arc::new(GeminiProvider::new(key.clone())?));
                    }
                }
                other => warn!(provider = other, "Unknown AI provider in configuration"),
            }
        }
        if providers.is_empty() {
            warn!("No AI provider configured; ingestion will fail until one is added");
        }
        let gateway = Arc::new(AiGateway::new(providers, config.vector_dim));

        // Taxonomy engine
        let taxonomy = Arc::new(TaxonomyService::new(taxonomy_repository, cache.clone()));
        if let Some(path) = &config.taxonomy_source_path {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    let rows = crate::application::services::taxonomy_service::parse_source_csv(
                        &content,
                    );
                    match taxonomy.initialize(&rows).await {
                        Ok(counts) => info!(
                            terms_created = counts.terms_created,
                            synonyms_created = counts.synonyms_created,
                            "Taxonomy source loaded"
                        ),
                        Err(err) => warn!(error = %err, "Taxonomy source load failed"),
                    }
                }
                Err(err) => warn!(path = %path, error = %err, "Cannot read taxonomy source file"),
            }
        }
        if let Err(err) = taxonomy.refresh_snapshot().await {
            warn!(error = %err, "Initial taxonomy snapshot load failed");
        }

        // Search
        let search = Arc::new(SearchService::new(
            documents.clone(),
            search_queries,
            taxonomy.clone(),
            cache.clone(),
            gateway.clone(),
            config.use_enhanced_relevance,
            Duration::from_secs(config.search_cache_ttl_s),
            Duration::from_secs(config.facet_cache_ttl_s),
        ));

        // Sessions
        let sessions = Arc::new(SessionService::new(
            &config.session_secret,
            Duration::from_secs(config.session_ttl_s),
            cache.clone(),
        ));

        // Ingestion pipeline
        let enqueuer = Arc::new(Enqueuer::new(
            documents.clone(),
            queue.clone(),
            config.queue_depth_watermark,
            Duration::from_secs(config.upload_batch_stagger_s),
            Duration::from_secs(config.stuck_document_threshold_s),
        ));

        let preview: Arc<dyn PreviewRenderer> = Arc::new(PassthroughPreviewRenderer);
        let worker_pool = Arc::new(WorkerPool::new(
            queue.clone(),
            documents.clone(),
            blobs.clone(),
            gateway.clone(),
            taxonomy.clone(),
            preview,
            cache.clone(),
            WorkerConfig {
                concurrency: config.worker_concurrency,
                visibility_timeout: Duration::from_secs(config.job_visibility_timeout_s),
                retry_base: Duration::from_secs(config.retry_base_s),
                retry_cap: Duration::from_secs(config.retry_cap_s),
                max_attempts: config.retry_max_attempts,
                require_embedding: config.require_embedding,
                shutdown_grace: Duration::from_secs(config.shutdown_grace_s),
            },
        ));

        let scheduler = Arc::new(Scheduler::new(
            queue,
            enqueuer.clone(),
            taxonomy.clone(),
            gateway.clone(),
            Duration::from_secs(config.scheduler_interval_s),
        ));

        // Use cases
        let upload_use_case = Arc::new(UploadDocumentsUseCase::new(
            documents.clone(),
            blobs.clone(),
            enqueuer.clone(),
            config.max_file_size_bytes,
        ));
        let reprocess_use_case = Arc::new(ReprocessDocumentUseCase::new(
            documents.clone(),
            enqueuer,
        ));
        let delete_use_case = Arc::new(DeleteDocumentUseCase::new(
            documents.clone(),
            blobs.clone(),
            search.clone(),
        ));

        // HTTP handlers
        let document_handler = Arc::new(DocumentHandler::new(
            upload_use_case,
            reprocess_use_case,
            delete_use_case,
            documents,
            blobs,
        ));
        let search_handler = Arc::new(SearchHandler::new(search));
        let taxonomy_handler = Arc::new(TaxonomyHandler::new(taxonomy));
        let rate_limiter = Arc::new(LoginRateLimiter::new(10, Duration::from_secs(60)));
        let auth_handler = Arc::new(AuthHandler::new(
            sessions.clone(),
            rate_limiter,
            config.app_password.clone(),
            config.session_cookie_secure,
            config.session_ttl_s,
        ));
        let health_handler = Arc::new(HealthHandler::new(sessions.clone()));

        let session_state = SessionLayerState {
            sessions,
            require_auth: config.require_auth,
            allow_unauthenticated_on_session_failure: config
                .allow_unauthenticated_on_session_failure,
            cookie_secure: config.session_cookie_secure,
            session_ttl_s: config.session_ttl_s,
        };

        info!(
            workers = config.worker_concurrency,
            vector_dim = config.vector_dim,
            ann_out_degree = config.ann_out_degree,
            ann_build_candidates = config.ann_build_candidates,
            "Application container assembled"
        );

        Ok(Self {
            config,
            worker_pool,
            scheduler,
            document_handler,
            search_handler,
            taxonomy_handler,
            auth_handler,
            health_handler,
            session_state,
        })
    }

    pub fn build_server(&self) -> HttpServer {
        // Multipart framing overhead on top of the file limit.
        let body_limit = self.config.max_file_size_bytes as usize + 1024 * 1024;

        HttpServer::new(
            self.document_handler.clone(),
            self.search_handler.clone(),
            self.taxonomy_handler.clone(),
            self.auth_handler.clone(),
            self.health_handler.clone(),
            self.session_state.clone(),
            body_limit,
            self.config.http_port,
        )
    }
}
