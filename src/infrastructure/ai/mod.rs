pub mod anthropic_provider;
pub mod gemini_provider;
pub mod openai_provider;

pub use anthropic_provider::AnthropicProvider;
pub use gemini_provider::GeminiProvider;
pub use openai_provider::OpenAiProvider;
