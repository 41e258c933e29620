use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::Document;

/// Deterministic classification of a search query. Drives the weight
/// table below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClass {
    Empty,
    Short,
    Entity,
    Category,
    Phrase,
    General,
}

/// Multi-factor scoring weights. Always sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub vector: f64,
    pub text: f64,
    pub taxonomy: f64,
    pub quality: f64,
    pub freshness: f64,
    pub popularity: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.vector + self.text + self.taxonomy + self.quality + self.freshness + self.popularity
    }

    fn for_class(class: QueryClass) -> Self {
        match class {
            QueryClass::Empty => Weights {
                vector: 0.00,
                text: 0.00,
                taxonomy: 0.00,
                quality: 0.50,
                freshness: 0.30,
                popularity: 0.20,
            },
            QueryClass::Short => Weights {
                vector: 0.50,
                text: 0.20,
                taxonomy: 0.15,
                quality: 0.05,
                freshness: 0.05,
                popularity: 0.05,
            },
            QueryClass::Entity => Weights {
                vector: 0.30,
                text: 0.35,
                taxonomy: 0.20,
                quality: 0.05,
                freshness: 0.05,
                popularity: 0.05,
            },
            QueryClass::Category => Weights {
                vector: 0.35,
                text: 0.15,
                taxonomy: 0.30,
                quality: 0.10,
                freshness: 0.05,
                popularity: 0.05,
            },
            QueryClass::Phrase => Weights {
                vector: 0.30,
                text: 0.40,
                taxonomy: 0.15,
                quality: 0.05,
                freshness: 0.05,
                popularity: 0.05,
            },
            QueryClass::General => Weights {
                vector: 0.40,
                text: 0.25,
                taxonomy: 0.15,
                quality: 0.10,
                freshness: 0.05,
                popularity: 0.05,
            },
        }
    }

    /// Taxonomy-filtered searches shift 0.10 onto the taxonomy factor,
    /// taken proportionally from the vector and text factors.
    fn with_filter_boost(mut self) -> Self {
        const SHIFT: f64 = 0.10;
        let pool = self.vector + self.text;
        if pool > f64::EPSILON {
            let shift = SHIFT.min(pool);
            self.vector -= shift * self.vector / pool;
            self.text -= shift * self.text / pool;
            self.taxonomy += shift;
        } else {
            // Browsing with a filter: vector/text carry no weight to give
            // up, so the boost comes out of the dominant quality factor.
            let shift = SHIFT.min(self.quality);
            self.quality -= shift;
            self.taxonomy += shift;
        }
        self
    }

    /// Fixed legacy blend used when enhanced relevance is switched off.
    pub fn legacy() -> Self {
        Weights {
            vector: 0.7,
            text: 0.3,
            taxonomy: 0.0,
            quality: 0.0,
            freshness: 0.0,
            popularity: 0.0,
        }
    }
}

/// Distinguishing vocabulary for entity-shaped queries.
const ENTITY_VOCAB: &[&str] = &[
    "campaign",
    "committee",
    "party",
    "organization",
    "candidate",
    "opponent",
    "client",
];

/// Per-candidate retrieval signals, normalized to [0,1] before weighting.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalSignals {
    pub vector_score: f64,
    pub text_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringExplanation {
    pub query_class: QueryClass,
    pub weights: Weights,
    pub dominant_factor: String,
}

pub struct RelevanceScorer {
    use_enhanced: bool,
}

impl RelevanceScorer {
    pub fn new(use_enhanced: bool) -> Self {
        Self { use_enhanced }
    }

    pub fn classify(&self, query: &str, primary_categories: &HashSet<String>) -> QueryClass {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return QueryClass::Empty;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        if is_entity_shaped(&tokens, &lowered) {
            return QueryClass::Entity;
        }

        if lowered
            .iter()
            .any(|t| primary_categories.iter().any(|c| c.to_lowercase() == *t))
        {
            return QueryClass::Category;
        }

        if tokens.len() <= 2 {
            return QueryClass::Short;
        }

        if trimmed.contains('"') || tokens.len() >= 5 {
            return QueryClass::Phrase;
        }

        QueryClass::General
    }

    pub fn weights(&self, class: QueryClass, has_taxonomy_filter: bool) -> Weights {
        if !self.use_enhanced {
            return Weights::legacy();
        }
        let base = Weights::for_class(class);
        if has_taxonomy_filter {
            base.with_filter_boost()
        } else {
            base
        }
    }

    /// Final blended score for one candidate document.
    #[allow(clippy::too_many_arguments)]
    pub fn score(
        &self,
        document: &Document,
        signals: RetrievalSignals,
        weights: &Weights,
        query: &str,
        canonical_term_filter: Option<&str>,
        primary_category_filter: Option<&str>,
    ) -> f64 {
        let taxonomy = taxonomy_score(
            document,
            query,
            canonical_term_filter,
            primary_category_filter,
        );
        let quality = quality_score(document);
        let freshness = freshness_score(document);
        let popularity = popularity_score(quality, document.mapping_count());

        weights.vector * signals.vector_score
            + weights.text * signals.text_score
            + weights.taxonomy * taxonomy
            + weights.quality * quality
            + weights.freshness * freshness
            + weights.popularity * popularity
    }

    pub fn explain(&self, class: QueryClass, weights: &Weights) -> ScoringExplanation {
        let factors = [
            ("vector", weights.vector),
            ("text", weights.text),
            ("taxonomy", weights.taxonomy),
            ("quality", weights.quality),
            ("freshness", weights.freshness),
            ("popularity", weights.popularity),
        ];
        let dominant = factors
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| *name)
            .unwrap_or("vector");

        ScoringExplanation {
            query_class: class,
            weights: *weights,
            dominant_factor: dominant.to_string(),
        }
    }
}

fn is_entity_shaped(tokens: &[&str], lowered: &[String]) -> bool {
    // Two or more adjacent capitalized tokens, e.g. "Jane Doe".
    let capitalized_pair = tokens.windows(2).any(|pair| {
        pair.iter().all(|t| {
            let mut chars = t.chars();
            matches!(chars.next(), Some(c) if c.is_uppercase())
                && chars.all(|c| c.is_lowercase())
        })
    });
    if capitalized_pair {
        return true;
    }

    lowered
        .iter()
        .any(|t| t.len() >= 3 && ENTITY_VOCAB.contains(&t.as_str()))
}

/// Taxonomy factor: exact canonical match (1.0), primary-category match
/// (0.7), keyword bonus (0.4), otherwise 0.
fn taxonomy_score(
    document: &Document,
    query: &str,
    canonical_term_filter: Option<&str>,
    primary_category_filter: Option<&str>,
) -> f64 {
    let canonical_terms: Vec<String> = document
        .canonical_terms()
        .iter()
        .map(|t| t.to_lowercase())
        .collect();
    let query_lower = query.trim().to_lowercase();

    if let Some(filter) = canonical_term_filter {
        if canonical_terms.contains(&filter.to_lowercase()) {
            return 1.0;
        }
    }
    if !query_lower.is_empty() && canonical_terms.contains(&query_lower) {
        return 1.0;
    }

    let primary_categories: Vec<String> = document
        .ai_analysis()
        .map(|a| {
            a.keyword_mappings
                .iter()
                .filter_map(|m| m.mapped_primary_category.clone())
                .chain(a.categories.iter().cloned())
                .map(|c| c.to_lowercase())
                .collect()
        })
        .unwrap_or_default();

    if let Some(filter) = primary_category_filter {
        if primary_categories.contains(&filter.to_lowercase()) {
            return 0.7;
        }
    }
    if !query_lower.is_empty() && primary_categories.contains(&query_lower) {
        return 0.7;
    }

    if !query_lower.is_empty() {
        let keyword_hit = document.keywords().iter().any(|k| {
            let k = k.to_lowercase();
            query_lower
                .split_whitespace()
                .any(|token| token.len() >= 3 && k.contains(token))
        });
        if keyword_hit {
            return 0.4;
        }
    }

    0.0
}

/// Piecewise completeness score over the four derived fields.
fn quality_score(document: &Document) -> f64 {
    let mut present = 0;
    if document.extracted_text().is_some() {
        present += 1;
    }
    if document.summary().is_some() {
        present += 1;
    }
    if document.search_vector().is_some() {
        present += 1;
    }
    if document.mapping_count() > 0 {
        present += 1;
    }

    match present {
        4 => 1.0,
        3 => 0.66,
        2 => 0.33,
        _ => 0.0,
    }
}

fn freshness_score(document: &Document) -> f64 {
    let age = Utc::now() - document.created_at();
    if age <= Duration::days(30) {
        1.0
    } else if age <= Duration::days(90) {
        0.6
    } else {
        0.2
    }
}

/// Deterministic popularity placeholder derived from quality and mapping
/// richness.
fn popularity_score(quality: f64, mapping_count: usize) -> f64 {
    (quality + 0.1 * ((1.0 + mapping_count as f64).ln())).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AiAnalysis, KeywordMapping};
    use crate::domain::value_objects::DocumentStatus;

    fn categories() -> HashSet<String> {
        ["Healthcare", "Education", "Economy"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::new(true)
    }

    #[test]
    fn test_classification_table() {
        let s = scorer();
        let cats = categories();

        assert_eq!(s.classify("", &cats), QueryClass::Empty);
        assert_eq!(s.classify("   ", &cats), QueryClass::Empty);
        assert_eq!(s.classify("budget", &cats), QueryClass::Short);
        assert_eq!(s.classify("budget cuts", &cats), QueryClass::Short);
        assert_eq!(s.classify("Jane Doe", &cats), QueryClass::Entity);
        assert_eq!(s.classify("campaign finance rules", &cats), QueryClass::Entity);
        assert_eq!(s.classify("healthcare", &cats), QueryClass::Category);
        assert_eq!(s.classify("\"universal coverage\" details", &cats), QueryClass::Phrase);
        assert_eq!(
            s.classify("what did the mailer say about taxes", &cats),
            QueryClass::Phrase
        );
        assert_eq!(s.classify("mailer about tax cuts", &cats), QueryClass::General);
    }

    #[test]
    fn test_weights_sum_to_one_for_every_class_and_filter_state() {
        let s = scorer();
        for class in [
            QueryClass::Empty,
            QueryClass::Short,
            QueryClass::Entity,
            QueryClass::Category,
            QueryClass::Phrase,
            QueryClass::General,
        ] {
            for filtered in [false, true] {
                let weights = s.weights(class, filtered);
                assert!(
                    (weights.sum() - 1.0).abs() < 1e-9,
                    "weights for {:?} filtered={} sum to {}",
                    class,
                    filtered,
                    weights.sum()
                );
            }
        }
    }

    #[test]
    fn test_filter_boost_shifts_weight_onto_taxonomy() {
        let s = scorer();
        let unfiltered = s.weights(QueryClass::General, false);
        let filtered = s.weights(QueryClass::General, true);

        assert!((filtered.taxonomy - (unfiltered.taxonomy + 0.10)).abs() < 1e-9);
        assert!(filtered.vector < unfiltered.vector);
        assert!(filtered.text < unfiltered.text);
    }

    #[test]
    fn test_legacy_mode_uses_fixed_blend() {
        let s = RelevanceScorer::new(false);
        let weights = s.weights(QueryClass::Phrase, true);
        assert_eq!(weights, Weights::legacy());
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    fn completed_document(mappings: Vec<KeywordMapping>, with_vector: bool) -> Document {
        let now = Utc::now();
        let keywords: Vec<String> = mappings.iter().map(|m| m.verbatim_term.clone()).collect();
        let analysis = AiAnalysis {
            summary: Some("Quarterly healthcare report".to_string()),
            categories: vec!["Healthcare".to_string()],
            keyword_mappings: mappings,
            ..Default::default()
        };
        Document::from_database(
            7,
            "report.pdf".to_string(),
            "uploads/x/report.pdf".to_string(),
            Some(2048),
            DocumentStatus::Completed,
            100,
            None,
            now,
            now,
            Some(now),
            Some("Quarterly report on healthcare policy".to_string()),
            Some(analysis),
            keywords,
            None,
            if with_vector { Some(vec![0.0; 4]) } else { None },
            None,
        )
    }

    #[test]
    fn test_taxonomy_score_tiers() {
        let doc = completed_document(
            vec![KeywordMapping {
                verbatim_term: "healthcare policy".to_string(),
                mapped_canonical_term: Some("Healthcare Policy".to_string()),
                mapped_primary_category: Some("Healthcare".to_string()),
                mapped_subcategory: None,
            }],
            true,
        );

        // Exact canonical term match.
        assert_eq!(taxonomy_score(&doc, "healthcare policy", None, None), 1.0);
        assert_eq!(taxonomy_score(&doc, "", Some("Healthcare Policy"), None), 1.0);
        // Primary category match.
        assert_eq!(taxonomy_score(&doc, "healthcare", None, None), 0.7);
        assert_eq!(taxonomy_score(&doc, "", None, Some("Healthcare")), 0.7);
        // Keyword bonus.
        assert_eq!(taxonomy_score(&doc, "policy review", None, None), 0.4);
        // No match at all.
        assert_eq!(taxonomy_score(&doc, "zoning", None, None), 0.0);
    }

    #[test]
    fn test_quality_score_steps() {
        let full = completed_document(
            vec![KeywordMapping::new("a", Some("A".to_string()))],
            true,
        );
        assert_eq!(quality_score(&full), 1.0);

        let missing_vector = completed_document(
            vec![KeywordMapping::new("a", Some("A".to_string()))],
            false,
        );
        assert_eq!(quality_score(&missing_vector), 0.66);

        let missing_mappings = completed_document(vec![], false);
        assert_eq!(quality_score(&missing_mappings), 0.33);
    }

    #[test]
    fn test_popularity_is_capped() {
        assert!(popularity_score(1.0, 100) <= 1.0);
        assert!(popularity_score(0.5, 3) > 0.5);
        assert_eq!(popularity_score(0.0, 0), 0.0);
    }

    #[test]
    fn test_score_prefers_stronger_retrieval_signals() {
        let s = scorer();
        let doc = completed_document(
            vec![KeywordMapping {
                verbatim_term: "healthcare policy".to_string(),
                mapped_canonical_term: Some("Healthcare Policy".to_string()),
                mapped_primary_category: Some("Healthcare".to_string()),
                mapped_subcategory: None,
            }],
            true,
        );
        let weights = s.weights(QueryClass::General, false);

        let strong = s.score(
            &doc,
            RetrievalSignals {
                vector_score: 0.95,
                text_score: 0.9,
            },
            &weights,
            "healthcare policy",
            None,
            None,
        );
        let weak = s.score(
            &doc,
            RetrievalSignals {
                vector_score: 0.2,
                text_score: 0.1,
            },
            &weights,
            "healthcare policy",
            None,
            None,
        );
        assert!(strong > weak);
        assert!(strong > 0.8);
    }
}
