mod common;

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use archivum::application::ports::ai_provider::{
    AiProvider, AiProviderError, AnalysisPrompt, CapabilitySet,
};
use archivum::application::services::ai_gateway::AiGateway;
use archivum::application::services::circuit_breaker::CircuitState;
use archivum::domain::value_objects::FileKind;

use common::{test_vector, StubProvider, TEST_VECTOR_DIM};

fn gateway(providers: Vec<Arc<dyn AiProvider>>) -> AiGateway {
    AiGateway::new(providers, TEST_VECTOR_DIM)
}

#[tokio::test]
async fn quota_failure_opens_circuit_and_fails_over() {
    let quota_provider = Arc::new(StubProvider::failing(
        "provider-a",
        AiProviderError::QuotaExhausted("monthly quota".to_string()),
    ));
    let healthy_provider = Arc::new(StubProvider::healthy("provider-b"));

    let gateway = gateway(vec![quota_provider.clone(), healthy_provider.clone()]);

    let analysis = gateway
        .analyze("report.pdf", "some text", &serde_json::json!({}), None)
        .await
        .unwrap();
    assert_eq!(analysis.summary.as_deref(), Some("Quarterly healthcare report"));
    assert_eq!(quota_provider.calls(), 1);
    assert_eq!(healthy_provider.calls(), 1);

    // Provider A's circuit is open for the cooldown; subsequent calls skip
    // it entirely.
    let states = gateway.provider_states();
    assert_eq!(states[0].1, CircuitState::Open);

    gateway
        .analyze("report.pdf", "more text", &serde_json::json!({}), None)
        .await
        .unwrap();
    assert_eq!(quota_provider.calls(), 1);
    assert_eq!(healthy_provider.calls(), 2);

    // The skip is observable as a counter.
    let states = gateway.provider_states();
    assert!(states[0].2 >= 1);
}

#[tokio::test]
async fn transient_failures_are_retried_against_the_same_provider() {
    let flaky = Arc::new(StubProvider::flaky(
        "flaky",
        AiProviderError::Transient("connection reset".to_string()),
        2,
    ));

    let gateway = gateway(vec![flaky.clone()]);
    let vector = gateway.embed("some text").await.unwrap();
    assert_eq!(vector, test_vector(0.5));
    // Two failures plus the successful attempt.
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn rate_limits_are_retried() {
    let flaky = Arc::new(StubProvider::flaky(
        "limited",
        AiProviderError::RateLimited("429".to_string()),
        1,
    ));

    let gateway = gateway(vec![flaky.clone()]);
    gateway.embed("text").await.unwrap();
    assert_eq!(flaky.calls(), 2);
}

#[tokio::test]
async fn unauthorized_is_never_retried() {
    let locked_out = Arc::new(StubProvider::failing(
        "locked",
        AiProviderError::Unauthorized("bad key".to_string()),
    ));

    let gateway = gateway(vec![locked_out.clone()]);
    let result = gateway.embed("text").await;
    assert!(matches!(result, Err(AiProviderError::Unauthorized(_))));
    assert_eq!(locked_out.calls(), 1);

    // A single auth failure does not open the circuit.
    assert_eq!(gateway.provider_states()[0].1, CircuitState::Closed);
}

#[tokio::test]
async fn capability_mismatch_skips_provider() {
    let mut extract_only = StubProvider::healthy("extract-only");
    extract_only.capabilities = CapabilitySet {
        extract: true,
        analyze: false,
        embed: false,
    };
    let extract_only = Arc::new(extract_only);
    let full = Arc::new(StubProvider::healthy("full"));

    let gateway = gateway(vec![extract_only.clone(), full.clone()]);
    gateway.embed("text").await.unwrap();
    assert_eq!(extract_only.calls(), 0);
    assert_eq!(full.calls(), 1);
}

#[tokio::test]
async fn embedding_dimension_is_validated() {
    let mut wrong_dim = StubProvider::healthy("short");
    wrong_dim.embed_response = vec![0.1, 0.2];
    let gateway = gateway(vec![Arc::new(wrong_dim)]);

    let result = gateway.embed("text").await;
    assert!(matches!(result, Err(AiProviderError::MalformedResponse(_))));
}

#[tokio::test]
async fn plain_text_and_office_extraction_bypass_providers() {
    let provider = Arc::new(StubProvider::healthy("unused"));
    let gateway = gateway(vec![provider.clone()]);

    let text = gateway
        .extract_text("hello world".as_bytes(), FileKind::Text)
        .await
        .unwrap();
    assert_eq!(text.text, "hello world");

    let office = gateway
        .extract_text(b"PK\x03\x04docx-bytes", FileKind::Office)
        .await
        .unwrap();
    assert_eq!(office.text, "");

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn unparseable_pdf_falls_back_to_provider_ocr() {
    let provider = Arc::new(StubProvider::healthy("ocr"));
    let gateway = gateway(vec![provider.clone()]);

    let extracted = gateway
        .extract_text(b"definitely not a pdf", FileKind::Pdf)
        .await
        .unwrap();
    assert_eq!(extracted.text, "Quarterly report on healthcare policy");
    assert_eq!(provider.calls(), 1);
}

/// Returns scripted responses in order, repeating the last one.
struct SequencedProvider {
    responses: Mutex<Vec<String>>,
}

#[async_trait]
impl AiProvider for SequencedProvider {
    fn name(&self) -> &str {
        "sequenced"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            extract: true,
            analyze: true,
            embed: true,
        }
    }

    async fn extract_text(&self, _data: &[u8], _kind: FileKind) -> Result<String, AiProviderError> {
        Ok(String::new())
    }

    async fn analyze(&self, _prompt: &AnalysisPrompt) -> Result<String, AiProviderError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            Ok(responses[0].clone())
        }
    }

    async fn embed(&self, _text: &str, dim: usize) -> Result<Vec<f32>, AiProviderError> {
        Ok(vec![0.0; dim])
    }
}

#[tokio::test]
async fn malformed_analysis_triggers_a_single_strict_re_ask() {
    let provider = Arc::new(SequencedProvider {
        responses: Mutex::new(vec![
            "I'm sorry, I cannot produce JSON today.".to_string(),
            r#"{"summary": "Recovered on the second ask"}"#.to_string(),
        ]),
    });

    let gateway = gateway(vec![provider]);
    let analysis = gateway
        .analyze("a.pdf", "text", &serde_json::json!({}), None)
        .await
        .unwrap();
    assert_eq!(analysis.summary.as_deref(), Some("Recovered on the second ask"));
}

#[tokio::test]
async fn persistently_malformed_analysis_is_terminal() {
    let provider = Arc::new(SequencedProvider {
        responses: Mutex::new(vec!["still not json".to_string()]),
    });

    let gateway = gateway(vec![provider]);
    let result = gateway
        .analyze("a.pdf", "text", &serde_json::json!({}), None)
        .await;
    assert!(matches!(result, Err(AiProviderError::MalformedResponse(_))));
}
