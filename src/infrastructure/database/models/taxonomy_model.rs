use diesel::prelude::*;

use crate::domain::entities::{TaxonomySynonym, TaxonomyTerm};
use crate::infrastructure::database::schema::{taxonomy_synonyms, taxonomy_terms};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = taxonomy_terms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaxonomyTermModel {
    pub id: i32,
    pub term: String,
    pub primary_category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = taxonomy_terms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewTaxonomyTermModel<'a> {
    pub term: &'a str,
    pub primary_category: Option<&'a str>,
    pub subcategory: Option<&'a str>,
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = taxonomy_synonyms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaxonomySynonymModel {
    pub id: i32,
    pub term_id: i32,
    pub synonym: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = taxonomy_synonyms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewTaxonomySynonymModel<'a> {
    pub term_id: i32,
    pub synonym: &'a str,
}

impl From<TaxonomyTermModel> for TaxonomyTerm {
    fn from(model: TaxonomyTermModel) -> Self {
        TaxonomyTerm {
            id: model.id,
            term: model.term,
            primary_category: model.primary_category,
            subcategory: model.subcategory,
            description: model.description,
            parent_id: model.parent_id,
        }
    }
}

impl From<TaxonomySynonymModel> for TaxonomySynonym {
    fn from(model: TaxonomySynonymModel) -> Self {
        TaxonomySynonym {
            id: model.id,
            term_id: model.term_id,
            synonym: model.synonym,
        }
    }
}
