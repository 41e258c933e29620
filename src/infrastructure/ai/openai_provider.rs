use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::ai_provider::{
    AiProvider, AiProviderError, AnalysisPrompt, CapabilitySet,
};
use crate::domain::value_objects::FileKind;
use crate::infrastructure::ai::anthropic_provider::classify_http_error;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const MAX_TOKENS: u32 = 4000;

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Result<Self, AiProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AiProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            chat_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: std::env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
        })
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        attachment: Option<(&[u8], FileKind)>,
    ) -> Result<String, AiProviderError> {
        let user_content = match attachment {
            Some((data, kind)) => serde_json::json!([
                {"type": "text", "text": user},
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!(
                            "data:{};base64,{}",
                            kind.content_type(),
                            BASE64.encode(data)
                        )
                    }
                }
            ]),
            None => serde_json::Value::String(user.to_string()),
        };

        let request = ChatRequest {
            model: &self.chat_model,
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: serde_json::Value::String(system.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
        };

        let response = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AiProviderError::MalformedResponse("Empty completion".to_string()))
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            extract: true,
            analyze: true,
            embed: true,
        }
    }

    async fn extract_text(&self, data: &[u8], kind: FileKind) -> Result<String, AiProviderError> {
        use crate::application::services::prompts::{OCR_SYSTEM_PROMPT, OCR_USER_PROMPT};
        self.complete(OCR_SYSTEM_PROMPT, OCR_USER_PROMPT, Some((data, kind)))
            .await
    }

    async fn analyze(&self, prompt: &AnalysisPrompt) -> Result<String, AiProviderError> {
        let attachment = prompt.attachment.as_deref().zip(prompt.attachment_kind);
        self.complete(&prompt.system, &prompt.user, attachment).await
    }

    async fn embed(&self, text: &str, dim: usize) -> Result<Vec<f32>, AiProviderError> {
        let request = EmbeddingsRequest {
            model: &self.embedding_model,
            input: text,
            dimensions: dim,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| {
                AiProviderError::MalformedResponse("No embedding returned".to_string())
            })
    }
}
