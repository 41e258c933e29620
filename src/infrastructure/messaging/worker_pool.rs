use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::application::ports::ai_provider::AiProviderError;
use crate::application::ports::blob_store::BlobStoreError;
use crate::application::ports::job_queue::{
    retry_backoff, JobQueue, ProcessJobPayload, ReservedJob, PROCESS_QUEUE,
};
use crate::application::ports::{BlobStore, Cache, PreviewRenderer};
use crate::application::services::ai_gateway::AiGateway;
use crate::application::services::search_service::FACETS_CACHE_KEY;
use crate::application::services::taxonomy_service::TaxonomyService;
use crate::domain::entities::{AiAnalysis, Document};
use crate::domain::repositories::{DocumentRepository, DocumentRepositoryError};
use crate::domain::value_objects::{DocumentStatus, FileKind};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub visibility_timeout: Duration,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    pub max_attempts: u32,
    pub require_embedding: bool,
    pub shutdown_grace: Duration,
}

/// Stage outcome classification: retriable failures go back on the queue
/// with backoff, terminal failures mark the document FAILED.
#[derive(Debug)]
enum StageError {
    Retriable(String),
    Terminal(String),
}

impl From<AiProviderError> for StageError {
    fn from(error: AiProviderError) -> Self {
        match &error {
            AiProviderError::Transient(_)
            | AiProviderError::RateLimited(_)
            | AiProviderError::QuotaExhausted(_)
            | AiProviderError::Unavailable(_) => StageError::Retriable(error.to_string()),
            AiProviderError::MalformedResponse(_) | AiProviderError::Unauthorized(_) => {
                StageError::Terminal(error.to_string())
            }
        }
    }
}

impl From<DocumentRepositoryError> for StageError {
    fn from(error: DocumentRepositoryError) -> Self {
        // Store write hiccups are worth another attempt; everything else
        // (bad transition, missing row) is not going to improve.
        match &error {
            DocumentRepositoryError::DatabaseError(_) => StageError::Retriable(error.to_string()),
            _ => StageError::Terminal(error.to_string()),
        }
    }
}

/// The worker pool behind the ingestion pipeline. Each worker reserves
/// one job at a time and drives a leased document through stages A-E;
/// workers never share mutable document state.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    documents: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStore>,
    gateway: Arc<AiGateway>,
    taxonomy: Arc<TaxonomyService>,
    preview: Arc<dyn PreviewRenderer>,
    cache: Arc<dyn Cache>,
    config: WorkerConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        documents: Arc<dyn DocumentRepository>,
        blobs: Arc<dyn BlobStore>,
        gateway: Arc<AiGateway>,
        taxonomy: Arc<TaxonomyService>,
        preview: Arc<dyn PreviewRenderer>,
        cache: Arc<dyn Cache>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            queue,
            documents,
            blobs,
            gateway,
            taxonomy,
            preview,
            cache,
            config,
            shutdown_tx,
        }
    }

    /// Spawn the workers and return their join handles.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        info!(workers = self.config.concurrency, "Starting worker pool");

        (0..self.config.concurrency)
            .map(|worker_id| {
                let pool = self.clone();
                let mut shutdown_rx = pool.shutdown_tx.subscribe();
                tokio::spawn(async move {
                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }

                        match pool.queue.reserve(PROCESS_QUEUE, pool.config.visibility_timeout).await {
                            Ok(Some(job)) => pool.handle_job(worker_id, job).await,
                            Ok(None) => {
                                // Idle; wake early on shutdown.
                                let _ = tokio::time::timeout(
                                    IDLE_POLL_INTERVAL,
                                    shutdown_rx.changed(),
                                )
                                .await;
                            }
                            Err(err) => {
                                warn!(worker_id, error = %err, "Job reservation failed");
                                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                            }
                        }
                    }
                    info!(worker_id, "Worker stopped");
                })
            })
            .collect()
    }

    /// Stop reserving new jobs and give in-flight work the grace period;
    /// anything still running is aborted and resurfaces through its lease
    /// expiry.
    pub async fn shutdown(&self, handles: Vec<tokio::task::JoinHandle<()>>) {
        let _ = self.shutdown_tx.send(true);

        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_grace, drain)
            .await
            .is_err()
        {
            warn!("Worker pool drain exceeded grace period; aborting remaining work");
        }
    }

    async fn handle_job(&self, worker_id: usize, job: ReservedJob) {
        let payload: ProcessJobPayload = match serde_json::from_slice(&job.payload) {
            Ok(payload) => payload,
            Err(err) => {
                error!(worker_id, error = %err, "Undecodable job payload; dropping");
                let _ = self.queue.ack(PROCESS_QUEUE, &job.job_id).await;
                return;
            }
        };
        let document_id = payload.document_id;

        info!(worker_id, document_id, attempts = job.attempts, "Processing document");

        match self.process_document(document_id).await {
            Ok(()) => {
                if let Err(err) = self.queue.ack(PROCESS_QUEUE, &job.job_id).await {
                    warn!(document_id, error = %err, "Failed to ack completed job");
                }
            }
            Err(StageError::Retriable(reason)) => {
                let next_attempt = job.attempts + 1;
                if next_attempt >= self.config.max_attempts {
                    warn!(document_id, attempts = next_attempt, reason = %reason, "Retry budget exhausted");
                    self.mark_failed(document_id, &format!("Retries exhausted: {}", reason))
                        .await;
                    let _ = self.queue.ack(PROCESS_QUEUE, &job.job_id).await;
                } else {
                    let delay =
                        retry_backoff(job.attempts, self.config.retry_base, self.config.retry_cap);
                    // Requeue resets the status machine for the next attempt.
                    if let Err(err) = self
                        .documents
                        .update_status(document_id, DocumentStatus::Queued, Some(0), None)
                        .await
                    {
                        warn!(document_id, error = %err, "Failed to re-queue document status");
                    }
                    if let Err(err) = self
                        .queue
                        .nack(PROCESS_QUEUE, &job.job_id, &reason, delay)
                        .await
                    {
                        error!(document_id, error = %err, "Failed to nack job");
                    }
                }
            }
            Err(StageError::Terminal(reason)) => {
                self.mark_failed(document_id, &reason).await;
                let _ = self.queue.ack(PROCESS_QUEUE, &job.job_id).await;
            }
        }
    }

    /// Stages A-E for one leased document.
    async fn process_document(&self, document_id: i32) -> Result<(), StageError> {
        let Some(document) = self.documents.find_by_id(document_id).await? else {
            info!(document_id, "Document vanished before processing; dropping job");
            return Ok(());
        };

        self.documents
            .update_status(document_id, DocumentStatus::Processing, Some(5), None)
            .await?;

        // Stage A: fetch bytes.
        let blob = match self.blobs.get(document.blob_key()).await {
            Ok(blob) => blob,
            Err(BlobStoreError::BlobMissing(key)) => {
                return Err(StageError::Terminal(format!("blob_missing: {}", key)));
            }
            Err(err) => return Err(StageError::Retriable(err.to_string())),
        };

        let Some(kind) = FileKind::from_filename(document.filename()) else {
            return Err(StageError::Terminal(format!(
                "unsupported_type: {}",
                document.filename()
            )));
        };

        // Stage B: text extraction.
        let extracted = self.gateway.extract_text(&blob, kind).await.map_err(|e| {
            match StageError::from(e) {
                StageError::Terminal(msg) => StageError::Terminal(format!("extraction: {}", msg)),
                retriable => retriable,
            }
        })?;
        self.documents
            .update_status(document_id, DocumentStatus::Processing, Some(25), None)
            .await?;

        // Stage C: structured analysis against the taxonomy snapshot.
        if let Err(err) = self.taxonomy.refresh_if_stale().await {
            warn!(error = %err, "Taxonomy snapshot refresh failed; using cached snapshot");
        }
        let snapshot = self.taxonomy.snapshot_for_prompt();
        let attachment = match kind {
            FileKind::Pdf | FileKind::Image => Some((blob.clone(), kind)),
            _ => None,
        };

        let mut analysis = self
            .gateway
            .analyze(document.filename(), &extracted.text, &snapshot, attachment)
            .await
            .map_err(|e| match StageError::from(e) {
                StageError::Terminal(msg) => StageError::Terminal(format!("analysis: {}", msg)),
                retriable => retriable,
            })?;

        // Invalid mappings are dropped, never fatal.
        let validated = self.taxonomy.validate_mappings(&analysis.keyword_mappings);
        if !validated.rejected.is_empty() {
            info!(
                document_id,
                rejected = validated.rejected.len(),
                "Dropped keyword mappings with unknown canonical terms"
            );
        }
        analysis.keyword_mappings = validated.valid;

        let keywords = analysis.keyword_list();
        let metadata = serde_json::json!({
            "file_type": kind.as_str(),
            "page_count": extracted.per_page.as_ref().map(|pages| pages.len()),
        });

        self.documents
            .update_content(
                document_id,
                &extracted.text,
                &analysis,
                &keywords,
                Some(&metadata),
                None,
            )
            .await?;

        let term_ids: Vec<i32> = analysis
            .keyword_mappings
            .iter()
            .filter_map(|m| m.mapped_canonical_term.as_deref())
            .filter_map(|term| self.taxonomy.term_id(term))
            .collect();
        self.documents
            .replace_taxonomy_mappings(document_id, &term_ids)
            .await?;

        self.documents
            .update_status(document_id, DocumentStatus::Processing, Some(55), None)
            .await?;

        // Stage D: embedding.
        let embedding_text = build_embedding_text(&document, &analysis, &extracted.text);
        match self.gateway.embed(&embedding_text).await {
            Ok(vector) => {
                self.documents
                    .update_embedding(document_id, &vector)
                    .await?;
            }
            Err(err) if self.config.require_embedding => {
                return Err(match StageError::from(err) {
                    StageError::Terminal(msg) => {
                        StageError::Terminal(format!("embedding: {}", msg))
                    }
                    retriable => retriable,
                });
            }
            Err(err) => {
                warn!(document_id, error = %err, "Embedding failed; completing without vector");
            }
        }
        self.documents
            .update_status(document_id, DocumentStatus::Processing, Some(80), None)
            .await?;

        // Stage E: best-effort preview, completion, cache invalidation.
        match self.preview.render(&blob, kind).await {
            Ok(Some(rendered)) => {
                let preview_key = format!("previews/{}/{}", document_id, preview_name(kind));
                match self
                    .blobs
                    .put(&preview_key, &rendered.data, &rendered.content_type)
                    .await
                {
                    Ok(stored_key) => {
                        self.documents
                            .update_preview_key(document_id, &stored_key)
                            .await?;
                    }
                    Err(err) => warn!(document_id, error = %err, "Preview upload failed"),
                }
            }
            Ok(None) => {}
            Err(err) => warn!(document_id, error = %err, "Preview render failed"),
        }

        self.documents
            .update_status(document_id, DocumentStatus::Completed, Some(100), None)
            .await?;

        self.invalidate_search_caches().await;

        info!(document_id, "Document processing completed");
        Ok(())
    }

    async fn mark_failed(&self, document_id: i32, reason: &str) {
        if let Err(err) = self
            .documents
            .update_status(
                document_id,
                DocumentStatus::Failed,
                None,
                Some(reason.to_string()),
            )
            .await
        {
            error!(document_id, error = %err, "Failed to mark document FAILED");
        }
    }

    /// Issued after the store write commits; readers may see stale cache
    /// entries for at most one round-trip.
    async fn invalidate_search_caches(&self) {
        if let Err(err) = self.cache.delete_prefix("search:").await {
            warn!(error = %err, "Search cache invalidation failed");
        }
        if let Err(err) = self.cache.delete(FACETS_CACHE_KEY).await {
            warn!(error = %err, "Facet cache invalidation failed");
        }
    }
}

fn preview_name(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Image => "preview.png",
        _ => "preview.bin",
    }
}

/// Synthesize the text that gets embedded: filename, summary, categories,
/// keywords, then the extracted body.
fn build_embedding_text(document: &Document, analysis: &AiAnalysis, extracted_text: &str) -> String {
    let mut parts: Vec<String> = vec![document.filename().to_string()];

    if let Some(summary) = &analysis.summary {
        parts.push(summary.clone());
    }
    if !analysis.categories.is_empty() {
        parts.push(analysis.categories.join(", "));
    }
    let keywords = analysis.keyword_list();
    if !keywords.is_empty() {
        parts.push(keywords.join(", "));
    }
    if !extracted_text.trim().is_empty() {
        parts.push(extracted_text.to_string());
    }

    parts.join("\n")
}
