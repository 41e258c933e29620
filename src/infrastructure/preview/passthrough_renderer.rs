use async_trait::async_trait;

use crate::application::ports::preview_renderer::{
    PreviewError, PreviewRenderer, RenderedPreview,
};
use crate::domain::value_objects::FileKind;

/// Minimal stand-in for the preview collaborator: images are their own
/// preview, everything else goes without one. Real rasterization lives
/// outside the core.
pub struct PassthroughPreviewRenderer;

#[async_trait]
impl PreviewRenderer for PassthroughPreviewRenderer {
    async fn render(
        &self,
        data: &[u8],
        kind: FileKind,
    ) -> Result<Option<RenderedPreview>, PreviewError> {
        match kind {
            FileKind::Image => Ok(Some(RenderedPreview {
                data: data.to_vec(),
                content_type: kind.content_type().to_string(),
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_images_pass_through() {
        let renderer = PassthroughPreviewRenderer;
        let preview = renderer
            .render(b"png bytes", FileKind::Image)
            .await
            .unwrap();
        assert!(preview.is_some());

        let none = renderer.render(b"%PDF-1.4", FileKind::Pdf).await.unwrap();
        assert!(none.is_none());
    }
}
