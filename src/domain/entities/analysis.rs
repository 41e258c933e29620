use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured result of an AI analysis pass over one document.
///
/// Recognized fields are typed; anything else the provider emits is
/// preserved verbatim in `extra` and ignored by search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_tone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_mappings: Vec<KeywordMapping>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A pair emitted by the AI: a surface string from the document and,
/// when the model could place it, the canonical taxonomy term it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub verbatim_term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_canonical_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_primary_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_subcategory: Option<String>,
}

impl KeywordMapping {
    pub fn new(verbatim_term: impl Into<String>, canonical: Option<String>) -> Self {
        Self {
            verbatim_term: verbatim_term.into(),
            mapped_canonical_term: canonical,
            mapped_primary_category: None,
            mapped_subcategory: None,
        }
    }
}

impl AiAnalysis {
    /// Keyword list used for search content and the JSONB `keywords`
    /// column: verbatim and canonical terms, deduplicated, in first-seen
    /// order.
    pub fn keyword_list(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut keywords = Vec::new();

        for mapping in &self.keyword_mappings {
            if !mapping.verbatim_term.is_empty() && seen.insert(mapping.verbatim_term.clone()) {
                keywords.push(mapping.verbatim_term.clone());
            }
            if let Some(canonical) = &mapping.mapped_canonical_term {
                if !canonical.is_empty() && seen.insert(canonical.clone()) {
                    keywords.push(canonical.clone());
                }
            }
        }

        keywords
    }

    pub fn canonical_terms(&self) -> Vec<String> {
        self.keyword_mappings
            .iter()
            .filter_map(|m| m.mapped_canonical_term.clone())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn mapping_count(&self) -> usize {
        self.keyword_mappings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = serde_json::json!({
            "summary": "Quarterly healthcare report",
            "categories": ["Healthcare"],
            "keyword_mappings": [
                {"verbatim_term": "healthcare policy", "mapped_canonical_term": "Healthcare Policy"}
            ],
            "design_elements": {"palette": ["blue"]},
            "election_year": 2024
        });

        let analysis: AiAnalysis = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("Quarterly healthcare report"));
        assert_eq!(analysis.extra.get("election_year"), Some(&serde_json::json!(2024)));

        let back = serde_json::to_value(&analysis).unwrap();
        assert_eq!(back.get("design_elements"), raw.get("design_elements"));
    }

    #[test]
    fn test_keyword_list_deduplicates_in_order() {
        let analysis = AiAnalysis {
            keyword_mappings: vec![
                KeywordMapping::new("health care", Some("Healthcare Policy".to_string())),
                KeywordMapping::new("healthcare policy", Some("Healthcare Policy".to_string())),
            ],
            ..Default::default()
        };

        assert_eq!(
            analysis.keyword_list(),
            vec!["health care", "Healthcare Policy", "healthcare policy"]
        );
        assert_eq!(analysis.mapping_count(), 2);
    }
}
