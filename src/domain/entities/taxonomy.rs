use serde::{Deserialize, Serialize};

/// Canonical term in the controlled vocabulary. Unique by `term`; the
/// parent relation forms a forest (cycles are rejected at load time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyTerm {
    pub id: i32,
    pub term: String,
    pub primary_category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
}

/// Alternative spelling or label resolving to a canonical term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomySynonym {
    pub id: i32,
    pub term_id: i32,
    pub synonym: String,
}

/// One row of the tabular source the taxonomy is initialized from.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomySourceRow {
    pub primary_category: String,
    pub subcategory: Option<String>,
    pub term: String,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaxonomyStatistics {
    pub total_terms: usize,
    pub total_synonyms: usize,
    pub primary_categories: usize,
    pub category_breakdown: std::collections::BTreeMap<String, usize>,
}
