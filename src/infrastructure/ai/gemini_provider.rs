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

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
enum Part {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData", rename_all = "camelCase")]
    InlineData { mime_type: String, data: String },
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    content: EmbedContent,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Result<Self, AiProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AiProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            embedding_model: std::env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
        })
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        attachment: Option<(&[u8], FileKind)>,
    ) -> Result<String, AiProviderError> {
        // Gemini has no system role; the system prompt rides ahead of the
        // user prompt.
        let mut parts = Vec::new();
        if let Some((data, kind)) = attachment {
            parts.push(Part::InlineData {
                mime_type: kind.content_type().to_string(),
                data: BASE64.encode(data),
            });
        }
        parts.push(Part::Text(format!(
            "System Prompt: {}\n\nUser Prompt: {}",
            system, user
        )));

        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                contents: vec![Content { parts }],
            })
            .send()
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(AiProviderError::MalformedResponse(
                "Empty completion".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
        let url = format!(
            "{}/{}:embedContent?key={}",
            API_BASE, self.embedding_model, self.api_key
        );
        let request = EmbedRequest {
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            output_dimensionality: dim,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        Ok(parsed.embedding.values)
    }
}
