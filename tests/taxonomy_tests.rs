mod common;

use std::sync::Arc;

use archivum::application::services::TaxonomyService;
use archivum::domain::entities::KeywordMapping;
use archivum::infrastructure::cache::MemoryCache;

use common::{healthcare_taxonomy, InMemoryTaxonomyRepository};

fn service() -> TaxonomyService {
    TaxonomyService::new(
        Arc::new(InMemoryTaxonomyRepository::new()),
        Arc::new(MemoryCache::new()),
    )
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let taxonomy = service();

    let first = taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();
    assert_eq!(first.terms_created, 3);
    assert_eq!(first.synonyms_created, 3);

    let stats_before = taxonomy.statistics();

    let second = taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();
    assert_eq!(second.terms_created, 0);
    assert_eq!(second.synonyms_created, 0);

    let stats_after = taxonomy.statistics();
    assert_eq!(stats_before, stats_after);
    assert_eq!(stats_after.total_terms, 3);
    assert_eq!(stats_after.total_synonyms, 3);
    assert_eq!(stats_after.primary_categories, 2);
}

#[tokio::test]
async fn hierarchy_groups_by_category_and_subcategory() {
    let taxonomy = service();
    taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();

    let hierarchy = taxonomy.hierarchy();
    let healthcare = hierarchy.get("Healthcare").unwrap();
    assert_eq!(
        healthcare.get("Policy").unwrap(),
        &vec!["Healthcare Policy".to_string()]
    );
    assert_eq!(
        healthcare.get("Access").unwrap(),
        &vec!["Medicaid Expansion".to_string()]
    );

    // Terms without a subcategory land under General.
    let economy = hierarchy.get("Economy").unwrap();
    assert_eq!(economy.get("General").unwrap(), &vec!["Taxes".to_string()]);
}

#[tokio::test]
async fn resolve_follows_the_match_order() {
    let taxonomy = service();
    taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();

    // 1. Exact case-insensitive canonical match.
    assert_eq!(
        taxonomy.resolve("healthcare policy"),
        Some("Healthcare Policy".to_string())
    );
    assert_eq!(
        taxonomy.resolve("HEALTHCARE POLICY"),
        Some("Healthcare Policy".to_string())
    );

    // 2. Exact synonym match.
    assert_eq!(
        taxonomy.resolve("medical policy"),
        Some("Healthcare Policy".to_string())
    );
    assert_eq!(taxonomy.resolve("taxation"), Some("Taxes".to_string()));

    // 3. Normalized equality (whitespace collapse).
    assert_eq!(
        taxonomy.resolve("  Healthcare   Policy "),
        Some("Healthcare Policy".to_string())
    );

    // 4. Fuzzy with a single candidate within distance 2.
    assert_eq!(
        taxonomy.resolve("Medicaid Expansio"),
        Some("Medicaid Expansion".to_string())
    );

    // No match at all.
    assert_eq!(taxonomy.resolve("zoning variance"), None);
    assert_eq!(taxonomy.resolve(""), None);
}

#[tokio::test]
async fn validate_mappings_drops_unknown_terms_and_enriches_known_ones() {
    let taxonomy = service();
    taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();

    let mappings = vec![
        KeywordMapping::new("healthcare policy", Some("Healthcare Policy".to_string())),
        KeywordMapping::new("made up", Some("Imaginary Term".to_string())),
        KeywordMapping::new("unmapped", None),
    ];

    let validated = taxonomy.validate_mappings(&mappings);
    assert_eq!(validated.valid.len(), 1);
    assert_eq!(validated.rejected.len(), 2);

    let kept = &validated.valid[0];
    assert_eq!(kept.mapped_canonical_term.as_deref(), Some("Healthcare Policy"));
    assert_eq!(kept.mapped_primary_category.as_deref(), Some("Healthcare"));
    assert_eq!(kept.mapped_subcategory.as_deref(), Some("Policy"));
}

#[tokio::test]
async fn find_or_create_is_visible_to_the_snapshot() {
    let taxonomy = service();
    taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();

    let created = taxonomy
        .find_or_create("Rural Broadband", Some("Infrastructure"), None)
        .await
        .unwrap();
    assert!(created.id > 0);

    assert!(taxonomy.canonical_terms().contains("Rural Broadband"));
    assert_eq!(
        taxonomy.resolve("rural broadband"),
        Some("Rural Broadband".to_string())
    );

    // Upsert of an existing term returns the original row.
    let again = taxonomy
        .find_or_create("Rural Broadband", Some("Infrastructure"), None)
        .await
        .unwrap();
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn term_search_prefers_prefix_matches() {
    let taxonomy = service();
    taxonomy.initialize(&healthcare_taxonomy()).await.unwrap();

    let results = taxonomy.search("health", 10);
    assert!(!results.is_empty());
    assert_eq!(results[0].term, "Healthcare Policy");

    let substring = taxonomy.search("expansion", 10);
    assert_eq!(substring.len(), 1);
    assert_eq!(substring[0].term, "Medicaid Expansion");

    assert!(taxonomy.search("", 10).is_empty());
}
