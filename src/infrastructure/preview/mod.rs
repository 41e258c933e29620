pub mod passthrough_renderer;

pub use passthrough_renderer::PassthroughPreviewRenderer;
