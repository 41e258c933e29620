use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::application::ports::Cache;
use crate::application::services::search_service::FACETS_CACHE_KEY;
use crate::domain::entities::{
    KeywordMapping, TaxonomySourceRow, TaxonomyStatistics, TaxonomySynonym, TaxonomyTerm,
};
use crate::domain::repositories::{TaxonomyRepository, TaxonomyRepositoryError, UpsertCounts};

/// How long a snapshot may serve reads before a refresh is due.
const SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(300);

/// Manages the controlled vocabulary and resolves free text to canonical
/// terms against a read-mostly in-memory snapshot of the hierarchy.
pub struct TaxonomyService {
    repository: Arc<dyn TaxonomyRepository>,
    cache: Arc<dyn Cache>,
    snapshot: RwLock<Snapshot>,
}

#[derive(Default)]
struct Snapshot {
    terms: Vec<TaxonomyTerm>,
    synonyms: Vec<TaxonomySynonym>,
    /// lowercased canonical term -> index into `terms`
    by_term: HashMap<String, usize>,
    /// lowercased synonym -> index into `terms`
    by_synonym: HashMap<String, usize>,
    /// normalized (lowercased, whitespace-collapsed) label -> term indexes,
    /// covering both canonical terms and synonyms
    by_normalized: HashMap<String, Vec<usize>>,
    loaded_at: Option<Instant>,
}

/// Result of screening AI keyword mappings against the vocabulary.
#[derive(Debug, Clone, Default)]
pub struct ValidatedMappings {
    pub valid: Vec<KeywordMapping>,
    pub rejected: Vec<KeywordMapping>,
}

impl TaxonomyService {
    pub fn new(repository: Arc<dyn TaxonomyRepository>, cache: Arc<dyn Cache>) -> Self {
        Self {
            repository,
            cache,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Load a hierarchy from a tabular source. Idempotent: existing terms
    /// and synonyms are left untouched. Refreshes the snapshot and
    /// invalidates the facet cache when anything changed.
    pub async fn initialize(
        &self,
        rows: &[TaxonomySourceRow],
    ) -> Result<UpsertCounts, TaxonomyRepositoryError> {
        for row in rows {
            if row.term.trim().is_empty() {
                return Err(TaxonomyRepositoryError::ValidationError(
                    "Taxonomy source row with empty term".to_string(),
                ));
            }
        }

        let counts = self.repository.bulk_upsert(rows).await?;
        self.refresh_snapshot().await?;

        if counts.terms_created > 0 || counts.synonyms_created > 0 {
            if let Err(err) = self.cache.delete(FACETS_CACHE_KEY).await {
                warn!(error = %err, "Failed to invalidate facet cache after taxonomy load");
            }
        }

        info!(
            terms_created = counts.terms_created,
            synonyms_created = counts.synonyms_created,
            "Taxonomy initialized"
        );
        Ok(counts)
    }

    /// Rebuild the in-memory snapshot from the store, rejecting parent
    /// cycles.
    pub async fn refresh_snapshot(&self) -> Result<(), TaxonomyRepositoryError> {
        let (terms, synonyms) = self.repository.load_all().await?;
        reject_parent_cycles(&terms)?;

        let built = Snapshot::build(terms, synonyms);
        let mut guard = self.snapshot.write().expect("taxonomy snapshot poisoned");
        *guard = built;
        Ok(())
    }

    pub async fn refresh_if_stale(&self) -> Result<(), TaxonomyRepositoryError> {
        let stale = {
            let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
            match guard.loaded_at {
                Some(at) => at.elapsed() > SNAPSHOT_MAX_AGE,
                None => true,
            }
        };
        if stale {
            self.refresh_snapshot().await?;
        }
        Ok(())
    }

    /// `{primary -> {subcategory -> [term]}}`; terms without a subcategory
    /// land under "General".
    pub fn hierarchy(&self) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        let mut hierarchy: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();

        for term in &guard.terms {
            let primary = term
                .primary_category
                .clone()
                .unwrap_or_else(|| "Other".to_string());
            let subcategory = term
                .subcategory
                .clone()
                .unwrap_or_else(|| "General".to_string());
            hierarchy
                .entry(primary)
                .or_default()
                .entry(subcategory)
                .or_default()
                .push(term.term.clone());
        }

        for subcategories in hierarchy.values_mut() {
            for terms in subcategories.values_mut() {
                terms.sort();
            }
        }

        hierarchy
    }

    pub fn canonical_terms(&self) -> HashSet<String> {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        guard.terms.iter().map(|t| t.term.clone()).collect()
    }

    pub fn primary_categories(&self) -> Vec<String> {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        let mut categories: Vec<String> = guard
            .terms
            .iter()
            .filter_map(|t| t.primary_category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        categories.sort();
        categories
    }

    /// Prefix-or-substring lookup over canonical terms, case-insensitive.
    pub fn search(&self, query: &str, limit: usize) -> Vec<TaxonomyTerm> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        let mut matches: Vec<&TaxonomyTerm> = guard
            .terms
            .iter()
            .filter(|t| t.term.to_lowercase().contains(&needle))
            .collect();
        // Prefix matches first, then alphabetical.
        matches.sort_by(|a, b| {
            let a_prefix = a.term.to_lowercase().starts_with(&needle);
            let b_prefix = b.term.to_lowercase().starts_with(&needle);
            b_prefix.cmp(&a_prefix).then_with(|| a.term.cmp(&b.term))
        });
        matches.into_iter().take(limit).cloned().collect()
    }

    /// Resolve a verbatim string to a canonical term.
    ///
    /// Match order: exact case-insensitive canonical, exact synonym,
    /// normalized equality, then fuzzy (edit distance <= 2) when a single
    /// candidate remains. Ties within a step break lexicographically.
    pub fn resolve(&self, verbatim: &str) -> Option<String> {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        let lowered = verbatim.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }

        if let Some(&idx) = guard.by_term.get(&lowered) {
            return Some(guard.terms[idx].term.clone());
        }

        if let Some(&idx) = guard.by_synonym.get(&lowered) {
            return Some(guard.terms[idx].term.clone());
        }

        let normalized = normalize_label(verbatim);
        if let Some(indexes) = guard.by_normalized.get(&normalized) {
            let mut candidates: Vec<&str> = indexes
                .iter()
                .map(|&idx| guard.terms[idx].term.as_str())
                .collect();
            candidates.sort();
            candidates.dedup();
            if let Some(first) = candidates.first() {
                return Some(first.to_string());
            }
        }

        // Fuzzy fallback: accept only when exactly one canonical target is
        // within distance 2 of the input.
        let mut fuzzy: HashSet<&str> = HashSet::new();
        for (label, &idx) in guard.by_term.iter().chain(guard.by_synonym.iter()) {
            if edit_distance_within(&lowered, label, 2) {
                fuzzy.insert(guard.terms[idx].term.as_str());
            }
        }
        if fuzzy.len() == 1 {
            return fuzzy.into_iter().next().map(|t| t.to_string());
        }

        None
    }

    /// Drop mappings whose canonical target is unknown; enrich surviving
    /// mappings with the term's category placement.
    pub fn validate_mappings(&self, mappings: &[KeywordMapping]) -> ValidatedMappings {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        let mut result = ValidatedMappings::default();

        for mapping in mappings {
            let Some(canonical) = mapping.mapped_canonical_term.as_deref() else {
                result.rejected.push(mapping.clone());
                continue;
            };

            match guard.by_term.get(&canonical.to_lowercase()) {
                Some(&idx) => {
                    let term = &guard.terms[idx];
                    result.valid.push(KeywordMapping {
                        verbatim_term: mapping.verbatim_term.clone(),
                        mapped_canonical_term: Some(term.term.clone()),
                        mapped_primary_category: term.primary_category.clone(),
                        mapped_subcategory: term.subcategory.clone(),
                    });
                }
                None => {
                    warn!(
                        canonical_term = canonical,
                        verbatim_term = %mapping.verbatim_term,
                        "Rejected keyword mapping: unknown canonical term"
                    );
                    result.rejected.push(mapping.clone());
                }
            }
        }

        result
    }

    pub fn term_id(&self, canonical: &str) -> Option<i32> {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        guard
            .by_term
            .get(&canonical.to_lowercase())
            .map(|&idx| guard.terms[idx].id)
    }

    pub async fn find_or_create(
        &self,
        term: &str,
        primary_category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<TaxonomyTerm, TaxonomyRepositoryError> {
        let created = self
            .repository
            .find_or_create(term, primary_category, subcategory)
            .await?;
        self.refresh_snapshot().await?;

        if let Err(err) = self.cache.delete(FACETS_CACHE_KEY).await {
            warn!(error = %err, "Failed to invalidate facet cache after term upsert");
        }

        Ok(created)
    }

    pub fn statistics(&self) -> TaxonomyStatistics {
        let guard = self.snapshot.read().expect("taxonomy snapshot poisoned");
        let mut breakdown: BTreeMap<String, usize> = BTreeMap::new();
        for term in &guard.terms {
            if let Some(primary) = &term.primary_category {
                *breakdown.entry(primary.clone()).or_default() += 1;
            }
        }

        TaxonomyStatistics {
            total_terms: guard.terms.len(),
            total_synonyms: guard.synonyms.len(),
            primary_categories: breakdown.len(),
            category_breakdown: breakdown,
        }
    }

    /// `{primary -> {subcategory -> [term]}}` rendered for the analysis
    /// prompt.
    pub fn snapshot_for_prompt(&self) -> serde_json::Value {
        serde_json::to_value(self.hierarchy()).unwrap_or(serde_json::Value::Null)
    }
}

impl Snapshot {
    fn build(terms: Vec<TaxonomyTerm>, synonyms: Vec<TaxonomySynonym>) -> Self {
        let mut by_term = HashMap::new();
        let mut by_synonym = HashMap::new();
        let mut by_normalized: HashMap<String, Vec<usize>> = HashMap::new();
        let term_index_by_id: HashMap<i32, usize> = terms
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.id, idx))
            .collect();

        for (idx, term) in terms.iter().enumerate() {
            by_term.insert(term.term.to_lowercase(), idx);
            by_normalized
                .entry(normalize_label(&term.term))
                .or_default()
                .push(idx);
        }

        for synonym in &synonyms {
            if let Some(&idx) = term_index_by_id.get(&synonym.term_id) {
                by_synonym.insert(synonym.synonym.to_lowercase(), idx);
                by_normalized
                    .entry(normalize_label(&synonym.synonym))
                    .or_default()
                    .push(idx);
            }
        }

        Self {
            terms,
            synonyms,
            by_term,
            by_synonym,
            by_normalized,
            loaded_at: Some(Instant::now()),
        }
    }
}

/// Parse the tabular taxonomy source format:
/// `primary_category,subcategory,term,synonym1|synonym2`. The first line
/// is a header; subcategory and synonyms may be empty.
pub fn parse_source_csv(content: &str) -> Vec<TaxonomySourceRow> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut fields = line.splitn(4, ',');
            let primary_category = fields.next()?.trim().to_string();
            let subcategory = fields
                .next()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let term = fields.next()?.trim().to_string();
            if primary_category.is_empty() || term.is_empty() {
                warn!(line = %line, "Skipping malformed taxonomy source row");
                return None;
            }
            let synonyms = fields
                .next()
                .map(|raw| {
                    raw.split('|')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            Some(TaxonomySourceRow {
                primary_category,
                subcategory,
                term,
                synonyms,
            })
        })
        .collect()
}

fn reject_parent_cycles(terms: &[TaxonomyTerm]) -> Result<(), TaxonomyRepositoryError> {
    let parent_by_id: HashMap<i32, Option<i32>> =
        terms.iter().map(|t| (t.id, t.parent_id)).collect();

    for term in terms {
        let mut slow = term.id;
        let mut seen = HashSet::new();
        seen.insert(slow);
        while let Some(Some(parent)) = parent_by_id.get(&slow) {
            if !seen.insert(*parent) {
                return Err(TaxonomyRepositoryError::CycleDetected(term.term.clone()));
            }
            slow = *parent;
        }
    }
    Ok(())
}

/// Lowercase and collapse internal whitespace.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Banded Levenshtein check: true when `edit_distance(a, b) <= max`.
fn edit_distance_within(a: &str, b: &str, max: usize) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return false;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
            row_min = row_min.min(current[j + 1]);
        }
        if row_min > max {
            return false;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()] <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_csv() {
        let content = "primary_category,subcategory,term,synonyms\n\
                       Healthcare,Policy,Healthcare Policy,health care policy|medical policy\n\
                       Economy,,Taxes,\n\
                       ,,Orphan,\n";
        let rows = parse_source_csv(content);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].term, "Healthcare Policy");
        assert_eq!(rows[0].subcategory.as_deref(), Some("Policy"));
        assert_eq!(rows[0].synonyms.len(), 2);
        assert_eq!(rows[1].term, "Taxes");
        assert_eq!(rows[1].subcategory, None);
        assert!(rows[1].synonyms.is_empty());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Healthcare   Policy "), "healthcare policy");
        assert_eq!(normalize_label("TAXES"), "taxes");
    }

    #[test]
    fn test_edit_distance_within() {
        assert!(edit_distance_within("healthcare", "healthcare", 2));
        assert!(edit_distance_within("helthcare", "healthcare", 2));
        assert!(edit_distance_within("healtcare", "healthcare", 1));
        assert!(!edit_distance_within("education", "healthcare", 2));
        assert!(!edit_distance_within("ab", "abcde", 2));
    }

    #[test]
    fn test_cycle_detection() {
        let terms = vec![
            TaxonomyTerm {
                id: 1,
                term: "A".to_string(),
                primary_category: None,
                subcategory: None,
                description: None,
                parent_id: Some(2),
            },
            TaxonomyTerm {
                id: 2,
                term: "B".to_string(),
                primary_category: None,
                subcategory: None,
                description: None,
                parent_id: Some(1),
            },
        ];
        assert!(reject_parent_cycles(&terms).is_err());

        let acyclic = vec![
            TaxonomyTerm {
                id: 1,
                term: "A".to_string(),
                primary_category: None,
                subcategory: None,
                description: None,
                parent_id: None,
            },
            TaxonomyTerm {
                id: 2,
                term: "B".to_string(),
                primary_category: None,
                subcategory: None,
                description: None,
                parent_id: Some(1),
            },
        ];
        assert!(reject_parent_cycles(&acyclic).is_ok());
    }
}
