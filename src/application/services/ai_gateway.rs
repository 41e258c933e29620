use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::application::ports::ai_provider::{
    AiProvider, AiProviderError, AnalysisPrompt, Capability,
};
use crate::application::services::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::application::services::prompts;
use crate::domain::entities::AiAnalysis;
use crate::domain::value_objects::FileKind;

/// Consecutive failures before a provider circuit opens.
const FAILURE_THRESHOLD: u32 = 5;
/// How long an open circuit stays open.
const CIRCUIT_COOLDOWN: Duration = Duration::from_secs(60);
/// Retry attempts per provider for retriable failures.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(15);
/// Hard per-request deadline.
const CALL_DEADLINE: Duration = Duration::from_secs(120);

/// Mean native characters per PDF page below which the OCR pass kicks in.
const PDF_NATIVE_TEXT_THRESHOLD: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub per_page: Option<Vec<String>>,
}

struct ProviderSlot {
    provider: Arc<dyn AiProvider>,
    breaker: CircuitBreaker,
    skipped_while_open: std::sync::atomic::AtomicU64,
}

/// Provider-agnostic front door for text extraction, structured analysis
/// and embedding generation. Providers are tried in configuration order;
/// a provider is eligible when its circuit is closed (or half-open with a
/// free probe slot) and it declares the needed capability.
pub struct AiGateway {
    slots: Vec<ProviderSlot>,
    vector_dim: usize,
}

impl AiGateway {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>, vector_dim: usize) -> Self {
        let slots = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                provider,
                breaker: CircuitBreaker::new(FAILURE_THRESHOLD, CIRCUIT_COOLDOWN),
                skipped_while_open: std::sync::atomic::AtomicU64::new(0),
            })
            .collect();
        Self { slots, vector_dim }
    }

    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }

    /// Circuit state per provider, for metrics and tests.
    pub fn provider_states(&self) -> Vec<(String, CircuitState, u64)> {
        self.slots
            .iter()
            .map(|slot| {
                (
                    slot.provider.name().to_string(),
                    slot.breaker.state(),
                    slot.skipped_while_open
                        .load(std::sync::atomic::Ordering::Relaxed),
                )
            })
            .collect()
    }

    /// Extract text from document bytes.
    ///
    /// PDFs run a native extraction pass first; when the mean yield is
    /// under the threshold the whole document goes through provider OCR.
    /// Images are OCR-only, plain text is decoded lossily, and office
    /// documents yield no text.
    pub async fn extract_text(
        &self,
        data: &[u8],
        kind: FileKind,
    ) -> Result<ExtractedText, AiProviderError> {
        match kind {
            FileKind::Text => Ok(ExtractedText {
                text: String::from_utf8_lossy(data).into_owned(),
                per_page: None,
            }),
            FileKind::Office => {
                warn!("Office document text extraction is not supported; proceeding without text");
                Ok(ExtractedText {
                    text: String::new(),
                    per_page: None,
                })
            }
            FileKind::Pdf => {
                match native_pdf_text(data) {
                    Ok(pages) if mean_page_chars(&pages) >= PDF_NATIVE_TEXT_THRESHOLD => {
                        Ok(ExtractedText {
                            text: pages.join("\n\n"),
                            per_page: Some(pages),
                        })
                    }
                    Ok(_) | Err(_) => {
                        // Scanned or unparseable PDF: OCR the document.
                        let text = self.ocr(data, FileKind::Pdf).await?;
                        Ok(ExtractedText {
                            text,
                            per_page: None,
                        })
                    }
                }
            }
            FileKind::Image => {
                let text = self.ocr(data, FileKind::Image).await?;
                Ok(ExtractedText {
                    text,
                    per_page: None,
                })
            }
        }
    }

    async fn ocr(&self, data: &[u8], kind: FileKind) -> Result<String, AiProviderError> {
        let data = Arc::new(data.to_vec());
        self.execute(Capability::Extract, move |provider| {
            let data = data.clone();
            async move { provider.extract_text(&data, kind).await }
        })
        .await
    }

    /// Structured analysis with enforced JSON shape. Provider output is
    /// sliced between the first `{` and the last `}`; a parse failure
    /// triggers exactly one re-ask with a stricter format instruction.
    pub async fn analyze(
        &self,
        filename: &str,
        extracted_text: &str,
        taxonomy_snapshot: &serde_json::Value,
        attachment: Option<(Vec<u8>, FileKind)>,
    ) -> Result<AiAnalysis, AiProviderError> {
        let prompt = Arc::new(prompts::unified_analysis_prompt(
            filename,
            extracted_text,
            taxonomy_snapshot,
            attachment,
        ));

        let prompt_for_call = prompt.clone();
        let raw = self
            .execute(Capability::Analyze, move |provider| {
                let prompt = prompt_for_call.clone();
                async move { provider.analyze(&prompt).await }
            })
            .await?;

        match parse_analysis(&raw) {
            Ok(analysis) => Ok(analysis),
            Err(first_err) => {
                info!(error = %first_err, "Analysis output malformed; re-asking once");
                let strict = Arc::new(AnalysisPrompt {
                    system: prompt.system.clone(),
                    user: format!("{}{}", prompt.user, prompts::STRICT_FORMAT_INSTRUCTION),
                    attachment: prompt.attachment.clone(),
                    attachment_kind: prompt.attachment_kind,
                });
                let raw = self
                    .execute(Capability::Analyze, move |provider| {
                        let prompt = strict.clone();
                        async move { provider.analyze(&prompt).await }
                    })
                    .await?;
                parse_analysis(&raw)
                    .map_err(|err| AiProviderError::MalformedResponse(err.to_string()))
            }
        }
    }

    /// Generate an embedding. The result length must match the store's
    /// indexed dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
        let dim = self.vector_dim;
        let text = Arc::new(text.to_string());
        let vector = self
            .execute(Capability::Embed, move |provider| {
                let text = text.clone();
                async move { provider.embed(&text, dim).await }
            })
            .await?;

        if vector.len() != self.vector_dim {
            return Err(AiProviderError::MalformedResponse(format!(
                "Embedding dimension {} does not match configured {}",
                vector.len(),
                self.vector_dim
            )));
        }
        Ok(vector)
    }

    /// Run `op` against the first eligible provider, retrying retriable
    /// failures with jittered exponential backoff and advancing to the
    /// next provider on persistent failure.
    async fn execute<T, F, Fut>(&self, capability: Capability, op: F) -> Result<T, AiProviderError>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T, AiProviderError>>,
    {
        let mut last_error: Option<AiProviderError> = None;

        for slot in &self.slots {
            if !slot.provider.capabilities().supports(capability) {
                continue;
            }
            if !slot.breaker.try_acquire() {
                slot.skipped_while_open
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                continue;
            }

            match self.call_with_retries(slot, &op).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        provider = slot.provider.name(),
                        error = %err,
                        "Provider call failed; advancing to next provider"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AiProviderError::Unavailable("No eligible provider".to_string())))
    }

    async fn call_with_retries<T, F, Fut>(
        &self,
        slot: &ProviderSlot,
        op: &F,
    ) -> Result<T, AiProviderError>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T, AiProviderError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(CALL_DEADLINE, op(slot.provider.clone())).await
            {
                Ok(result) => result,
                Err(_) => Err(AiProviderError::Transient(format!(
                    "Deadline of {}s exceeded",
                    CALL_DEADLINE.as_secs()
                ))),
            };

            match outcome {
                Ok(value) => {
                    slot.breaker.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    // Quota exhaustion short-circuits the provider for the
                    // whole cooldown; ordinary rate limits count toward the
                    // consecutive-failure threshold and are retried.
                    let fatal = matches!(err, AiProviderError::QuotaExhausted(_));
                    slot.breaker.record_failure(fatal);

                    if err.is_retriable() && attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(jittered_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

fn jittered_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(8);
    let base_ms = RETRY_BASE.as_millis() as u64 * (1 << exp);
    let capped = base_ms.min(RETRY_CAP.as_millis() as u64);
    let jitter = rand::thread_rng().gen_range(0..=capped / 2);
    Duration::from_millis(capped + jitter)
}

fn mean_page_chars(pages: &[String]) -> usize {
    if pages.is_empty() {
        return 0;
    }
    pages.iter().map(|p| p.trim().len()).sum::<usize>() / pages.len()
}

/// Native (non-OCR) PDF text extraction, one string per page.
fn native_pdf_text(data: &[u8]) -> Result<Vec<String>, String> {
    let document = lopdf::Document::load_mem(data).map_err(|e| e.to_string())?;
    let mut pages = Vec::new();
    for (page_number, _) in document.get_pages() {
        let text = document
            .extract_text(&[page_number])
            .unwrap_or_default()
            .trim()
            .to_string();
        pages.push(text);
    }
    if pages.is_empty() {
        return Err("PDF has no pages".to_string());
    }
    Ok(pages)
}

/// Slice the provider output between the first `{` and the last `}` and
/// parse it. Fenced ```json blocks are honored first.
pub fn parse_analysis(raw: &str) -> Result<AiAnalysis, String> {
    let candidate = if let Some(fenced) = extract_fenced_json(raw) {
        fenced
    } else {
        let start = raw.find('{').ok_or("No opening brace in response")?;
        let end = raw.rfind('}').ok_or("No closing brace in response")?;
        if end <= start {
            return Err("Braces out of order in response".to_string());
        }
        &raw[start..=end]
    };

    serde_json::from_str::<AiAnalysis>(candidate).map_err(|e| e.to_string())
}

fn extract_fenced_json(raw: &str) -> Option<&str> {
    let start = raw.find("```json")? + "```json".len();
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_with_prose_prefix_and_suffix() {
        let raw = r#"Here is my analysis of the document:
{"summary": "A report", "categories": ["Healthcare"]}
Let me know if you need anything else."#;

        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("A report"));
        assert_eq!(analysis.categories, vec!["Healthcare"]);
    }

    #[test]
    fn test_parse_analysis_with_nested_json() {
        let raw = r#"{"summary": "S", "keyword_mappings": [{"verbatim_term": "v", "mapped_canonical_term": "C"}], "entities": {"client_name": "Jane Doe"}}"#;
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.keyword_mappings.len(), 1);
        assert!(analysis.extra.contains_key("entities"));
    }

    #[test]
    fn test_parse_analysis_fenced_block() {
        let raw = "Sure!\n```json\n{\"summary\": \"Fenced\"}\n```\nDone.";
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("Fenced"));
    }

    #[test]
    fn test_parse_analysis_rejects_braceless_output() {
        assert!(parse_analysis("I could not analyze this document.").is_err());
        assert!(parse_analysis("} malformed {").is_err());
    }

    #[test]
    fn test_mean_page_chars() {
        let pages = vec!["a".repeat(100), "b".repeat(20)];
        assert_eq!(mean_page_chars(&pages), 60);
        assert_eq!(mean_page_chars(&[]), 0);
    }

    #[test]
    fn test_jittered_backoff_respects_cap() {
        for attempt in 1..10 {
            let delay = jittered_backoff(attempt);
            assert!(delay <= RETRY_CAP + RETRY_CAP / 2);
        }
    }
}
