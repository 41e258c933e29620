//! Prompt construction for document analysis and OCR calls.

use crate::application::ports::ai_provider::AnalysisPrompt;
use crate::domain::value_objects::FileKind;

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert document analyzer specializing in \
campaign and advocacy materials. Provide accurate, objective analysis in the exact JSON format \
requested.";

pub const OCR_SYSTEM_PROMPT: &str = "You are an expert OCR engine. Extract any and all text from \
the given document, accurately, preserving the original formatting as much as possible. Only \
return the extracted text, with no additional comments, introductions, or summaries.";

pub const OCR_USER_PROMPT: &str = "Please extract all text from this document.";

/// Appended to the user prompt on the single re-ask after a malformed
/// response.
pub const STRICT_FORMAT_INSTRUCTION: &str = "\n\nIMPORTANT: Your previous response was not valid \
JSON. Respond with ONLY a single valid JSON object matching the requested schema. Do not include \
markdown fences, prose, or any text outside the JSON object.";

/// Build the unified analysis prompt: extraction evidence, taxonomy
/// mapping against the provided snapshot, then strict JSON output.
pub fn unified_analysis_prompt(
    filename: &str,
    extracted_text: &str,
    taxonomy_snapshot: &serde_json::Value,
    attachment: Option<(Vec<u8>, FileKind)>,
) -> AnalysisPrompt {
    let taxonomy_json =
        serde_json::to_string_pretty(taxonomy_snapshot).unwrap_or_else(|_| "{}".to_string());

    let text_section = if extracted_text.trim().is_empty() {
        String::new()
    } else {
        let mut clipped = extracted_text.to_string();
        if clipped.len() > 4000 {
            let mut end = 4000;
            while !clipped.is_char_boundary(end) {
                end -= 1;
            }
            clipped.truncate(end);
        }
        format!("\n\nExtracted Text from Document:\n{}\n", clipped)
    };

    let user = format!(
        r#"Analyze the document '{filename}' by following these steps precisely.
{text_section}
**Step 1: Initial Analysis & Evidence Gathering**
Write down your reasoning and cite direct evidence from the document.
- **Summary:** What is the document's core message?
- **Document Type Evidence:** What clues indicate the type of document?
- **Tone Evidence:** Quote words or phrases that establish the tone.
- **Keyword Evidence:** Identify 10-15 of the most important and specific keywords or keyphrases mentioned in the document, verbatim.

**Step 2: Map Keywords to Canonical Taxonomy**
For each verbatim keyphrase, map it to the single most relevant canonical term from the official taxonomy provided below. Skip keyphrases with no suitable canonical term rather than inventing one.

**Official Canonical Taxonomy:**
```json
{taxonomy_json}
```

**Step 3: JSON Output Generation**
Based ONLY on your reasoning above, respond with the final analysis in this exact JSON shape. If you cannot find evidence for a field, its value MUST be null.

```json
{{
  "summary": "Clear 1-2 sentence overview of the document's purpose.",
  "document_type": "e.g. 'mailer', 'brochure', 'letter', 'poster'",
  "campaign_type": "e.g. 'primary', 'general', 'special'",
  "document_tone": "e.g. 'positive', 'negative', 'neutral', 'informational'",
  "categories": ["primary categories this document belongs to"],
  "keyword_mappings": [
    {{
      "verbatim_term": "exact phrase from the document",
      "mapped_primary_category": "primary category from the official taxonomy",
      "mapped_subcategory": "subcategory from the official taxonomy",
      "mapped_canonical_term": "canonical term from the official taxonomy"
    }}
  ]
}}
```

Your response MUST be valid JSON formatted exactly as requested above."#,
    );

    let (attachment, attachment_kind) = match attachment {
        Some((data, kind)) => (Some(data), Some(kind)),
        None => (None, None),
    };

    AnalysisPrompt {
        system: ANALYSIS_SYSTEM_PROMPT.to_string(),
        user,
        attachment,
        attachment_kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_taxonomy_and_text() {
        let taxonomy = serde_json::json!({
            "Healthcare": {"General": ["Healthcare Policy"]}
        });
        let prompt = unified_analysis_prompt(
            "report.pdf",
            "Quarterly report on healthcare policy",
            &taxonomy,
            None,
        );

        assert!(prompt.user.contains("report.pdf"));
        assert!(prompt.user.contains("Healthcare Policy"));
        assert!(prompt.user.contains("Quarterly report on healthcare policy"));
        assert!(prompt.attachment.is_none());
    }

    #[test]
    fn test_prompt_clips_long_text() {
        let long_text = "word ".repeat(5000);
        let prompt = unified_analysis_prompt("a.txt", &long_text, &serde_json::json!({}), None);
        // Clipped to roughly 4k chars of document text plus the template.
        assert!(prompt.user.len() < long_text.len());
    }
}
