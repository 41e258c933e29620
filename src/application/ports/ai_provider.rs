use async_trait::async_trait;

use crate::domain::value_objects::FileKind;

/// Failure taxonomy shared by every provider. The gateway's retry and
/// circuit-breaking decisions key off these variants.
#[derive(Debug, Clone)]
pub enum AiProviderError {
    Transient(String),
    RateLimited(String),
    QuotaExhausted(String),
    MalformedResponse(String),
    Unauthorized(String),
    Unavailable(String),
}

impl AiProviderError {
    /// Transient and rate-limit failures may be retried against the same
    /// provider; everything else either fails over or fails outright.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AiProviderError::Transient(_) | AiProviderError::RateLimited(_)
        )
    }
}

impl std::fmt::Display for AiProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProviderError::Transient(msg) => write!(f, "Transient provider error: {}", msg),
            AiProviderError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AiProviderError::QuotaExhausted(msg) => write!(f, "Quota exhausted: {}", msg),
            AiProviderError::MalformedResponse(msg) => {
                write!(f, "Malformed provider response: {}", msg)
            }
            AiProviderError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AiProviderError::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AiProviderError {}

/// Which of the three work families a provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    pub extract: bool,
    pub analyze: bool,
    pub embed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Extract,
    Analyze,
    Embed,
}

impl CapabilitySet {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Extract => self.extract,
            Capability::Analyze => self.analyze,
            Capability::Embed => self.embed,
        }
    }
}

/// Prompt bundle for a structured analysis call. The provider returns its
/// raw text output; JSON enforcement lives in the gateway.
#[derive(Debug, Clone)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
    /// PNG or PDF bytes for vision-capable models.
    pub attachment: Option<Vec<u8>>,
    pub attachment_kind: Option<FileKind>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> CapabilitySet;

    /// OCR-style text extraction from raw document bytes.
    async fn extract_text(&self, data: &[u8], kind: FileKind) -> Result<String, AiProviderError>;

    /// Structured analysis; returns the provider's raw completion text.
    async fn analyze(&self, prompt: &AnalysisPrompt) -> Result<String, AiProviderError>;

    /// Embedding of `text` into `dim` dimensions.
    async fn embed(&self, text: &str, dim: usize) -> Result<Vec<f32>, AiProviderError>;
}
