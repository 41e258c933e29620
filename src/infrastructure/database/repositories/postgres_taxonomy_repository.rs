use async_trait::async_trait;
use diesel::prelude::*;

use crate::domain::entities::{TaxonomySourceRow, TaxonomySynonym, TaxonomyTerm};
use crate::domain::repositories::taxonomy_repository::{
    TaxonomyRepository, TaxonomyRepositoryError, UpsertCounts,
};
use crate::infrastructure::database::models::{
    NewTaxonomySynonymModel, NewTaxonomyTermModel, TaxonomySynonymModel, TaxonomyTermModel,
};
use crate::infrastructure::database::schema::{taxonomy_synonyms, taxonomy_terms};
use crate::infrastructure::database::{get_connection_from_pool, DbConnection, DbPool};

pub struct PostgresTaxonomyRepository {
    pool: DbPool,
}

impl PostgresTaxonomyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConnection, TaxonomyRepositoryError> {
        get_connection_from_pool(&self.pool)
            .map_err(|e| TaxonomyRepositoryError::DatabaseError(e.to_string()))
    }
}

impl From<diesel::result::Error> for TaxonomyRepositoryError {
    fn from(error: diesel::result::Error) -> Self {
        TaxonomyRepositoryError::DatabaseError(error.to_string())
    }
}

#[async_trait]
impl TaxonomyRepository for PostgresTaxonomyRepository {
    async fn bulk_upsert(
        &self,
        rows: &[TaxonomySourceRow],
    ) -> Result<UpsertCounts, TaxonomyRepositoryError> {
        let mut conn = self.conn()?;

        conn.transaction::<_, TaxonomyRepositoryError, _>(|conn| {
            let mut counts = UpsertCounts::default();

            for row in rows {
                let new_term = NewTaxonomyTermModel {
                    term: &row.term,
                    primary_category: Some(row.primary_category.as_str()),
                    subcategory: row.subcategory.as_deref(),
                    description: None,
                };

                let inserted = diesel::insert_into(taxonomy_terms::table)
                    .values(&new_term)
                    .on_conflict(taxonomy_terms::term)
                    .do_nothing()
                    .execute(conn)?;
                counts.terms_created += inserted;

                let term_id: i32 = taxonomy_terms::table
                    .filter(taxonomy_terms::term.eq(&row.term))
                    .select(taxonomy_terms::id)
                    .first(conn)?;

                for synonym in &row.synonyms {
                    if synonym.trim().is_empty() {
                        continue;
                    }
                    let new_synonym = NewTaxonomySynonymModel {
                        term_id,
                        synonym: synonym.trim(),
                    };
                    let inserted = diesel::insert_into(taxonomy_synonyms::table)
                        .values(&new_synonym)
                        .on_conflict((taxonomy_synonyms::term_id, taxonomy_synonyms::synonym))
                        .do_nothing()
                        .execute(conn)?;
                    counts.synonyms_created += inserted;
                }
            }

            Ok(counts)
        })
    }

    async fn load_all(
        &self,
    ) -> Result<(Vec<TaxonomyTerm>, Vec<TaxonomySynonym>), TaxonomyRepositoryError> {
        let mut conn = self.conn()?;

        let terms = taxonomy_terms::table
            .order(taxonomy_terms::term.asc())
            .load::<TaxonomyTermModel>(&mut conn)?
            .into_iter()
            .map(TaxonomyTerm::from)
            .collect();

        let synonyms = taxonomy_synonyms::table
            .order(taxonomy_synonyms::id.asc())
            .load::<TaxonomySynonymModel>(&mut conn)?
            .into_iter()
            .map(TaxonomySynonym::from)
            .collect();

        Ok((terms, synonyms))
    }

    async fn find_or_create(
        &self,
        term: &str,
        primary_category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<TaxonomyTerm, TaxonomyRepositoryError> {
        let mut conn = self.conn()?;

        conn.transaction::<_, TaxonomyRepositoryError, _>(|conn| {
            let new_term = NewTaxonomyTermModel {
                term,
                primary_category,
                subcategory,
                description: None,
            };

            diesel::insert_into(taxonomy_terms::table)
                .values(&new_term)
                .on_conflict(taxonomy_terms::term)
                .do_nothing()
                .execute(conn)?;

            let model: TaxonomyTermModel = taxonomy_terms::table
                .filter(taxonomy_terms::term.eq(term))
                .first(conn)?;

            Ok(TaxonomyTerm::from(model))
        })
    }
}
