use async_trait::async_trait;

use crate::domain::value_objects::FileKind;

#[derive(Debug)]
pub enum PreviewError {
    RenderFailed(String),
}

impl std::fmt::Display for PreviewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreviewError::RenderFailed(msg) => write!(f, "Preview render failed: {}", msg),
        }
    }
}

impl std::error::Error for PreviewError {}

#[derive(Debug, Clone)]
pub struct RenderedPreview {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Boundary to the preview collaborator. Rendering is best-effort: the
/// pipeline treats `Ok(None)` and `Err` the same way and completes the
/// document without a preview.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    async fn render(
        &self,
        data: &[u8],
        kind: FileKind,
    ) -> Result<Option<RenderedPreview>, PreviewError>;
}
