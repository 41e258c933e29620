pub mod ai_provider;
pub mod blob_store;
pub mod cache;
pub mod job_queue;
pub mod preview_renderer;

pub use ai_provider::{AiProvider, AiProviderError, AnalysisPrompt, Capability, CapabilitySet};
pub use blob_store::{BlobStore, BlobStoreError};
pub use cache::{Cache, CacheError, CacheHealth};
pub use job_queue::{
    JobQueue, JobQueueError, ProcessJobPayload, ReservedJob, PROCESS_QUEUE, retry_backoff,
};
pub use preview_renderer::{PreviewError, PreviewRenderer, RenderedPreview};
