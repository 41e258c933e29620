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

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const MAX_TOKENS: u32 = 4000;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: MediaSource,
    },
    Document {
        source: MediaSource,
    },
}

#[derive(Serialize)]
struct MediaSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Result<Self, AiProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AiProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }

    fn attachment_block(data: &[u8], kind: FileKind) -> ContentBlock {
        let source = MediaSource {
            source_type: "base64",
            media_type: kind.content_type().to_string(),
            data: BASE64.encode(data),
        };
        match kind {
            FileKind::Pdf => ContentBlock::Document { source },
            _ => ContentBlock::Image { source },
        }
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        attachment: Option<(&[u8], FileKind)>,
    ) -> Result<String, AiProviderError> {
        let mut content = Vec::new();
        if let Some((data, kind)) = attachment {
            content.push(Self::attachment_block(data, kind));
        }
        content.push(ContentBlock::Text {
            text: user.to_string(),
        });

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        let text: String = parsed
            .content
            .into_iter()
            .map(|block| block.text)
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

pub fn classify_http_error(status: u16, body: &str) -> AiProviderError {
    let lowered = body.to_lowercase();
    match status {
        401 | 403 => AiProviderError::Unauthorized(format!("HTTP {}", status)),
        429 => {
            if lowered.contains("quota") || lowered.contains("billing") {
                AiProviderError::QuotaExhausted(format!("HTTP 429: {}", body))
            } else {
                AiProviderError::RateLimited(format!("HTTP 429: {}", body))
            }
        }
        402 => AiProviderError::QuotaExhausted(format!("HTTP 402: {}", body)),
        500..=599 => AiProviderError::Transient(format!("HTTP {}: {}", status, body)),
        other => AiProviderError::Unavailable(format!("HTTP {}: {}", other, body)),
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            extract: true,
            analyze: true,
            embed: false,
        }
    }

    async fn extract_text(&self, data: &[u8], kind: FileKind) -> Result<String, AiProviderError> {
        use crate::application::services::prompts::{OCR_SYSTEM_PROMPT, OCR_USER_PROMPT};
        self.complete(OCR_SYSTEM_PROMPT, OCR_USER_PROMPT, Some((data, kind)))
            .await
    }

    async fn analyze(&self, prompt: &AnalysisPrompt) -> Result<String, AiProviderError> {
        let attachment = prompt
            .attachment
            .as_deref()
            .zip(prompt.attachment_kind);
        self.complete(&prompt.system, &prompt.user, attachment).await
    }

    async fn embed(&self, _text: &str, _dim: usize) -> Result<Vec<f32>, AiProviderError> {
        Err(AiProviderError::Unavailable(
            "Anthropic does not provide an embeddings endpoint".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_classification() {
        assert!(matches!(
            classify_http_error(401, ""),
            AiProviderError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_http_error(429, "rate limit exceeded"),
            AiProviderError::RateLimited(_)
        ));
        assert!(matches!(
            classify_http_error(429, "monthly quota exceeded"),
            AiProviderError::QuotaExhausted(_)
        ));
        assert!(matches!(
            classify_http_error(503, "overloaded"),
            AiProviderError::Transient(_)
        ));
    }
}
