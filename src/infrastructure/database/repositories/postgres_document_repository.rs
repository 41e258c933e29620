use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Float4, Integer, Nullable, Text};
use pgvector::Vector;

use crate::domain::entities::{AiAnalysis, Document};
use crate::domain::repositories::document_repository::{
    DocumentFilter, DocumentPage, DocumentRepository, DocumentRepositoryError, FacetCount,
    PageRequest, SortDirection, SortKey,
};
use crate::domain::value_objects::DocumentStatus;
use crate::infrastructure::database::models::{DocumentModel, NewDocumentModel};
use crate::infrastructure::database::schema::{document_taxonomy_map, documents, taxonomy_terms};
use crate::infrastructure::database::{get_connection_from_pool, DbConnection, DbPool};

pub struct PostgresDocumentRepository {
    pool: DbPool,
    vector_dim: usize,
}

impl PostgresDocumentRepository {
    pub fn new(pool: DbPool, vector_dim: usize) -> Self {
        Self { pool, vector_dim }
    }

    fn conn(&self) -> Result<DbConnection, DocumentRepositoryError> {
        get_connection_from_pool(&self.pool)
            .map_err(|e| DocumentRepositoryError::DatabaseError(e.to_string()))
    }
}

impl From<diesel::result::Error> for DocumentRepositoryError {
    fn from(error: diesel::result::Error) -> Self {
        DocumentRepositoryError::DatabaseError(error.to_string())
    }
}

#[derive(QueryableByName)]
struct IdScoreRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Float4)]
    score: f32,
}

#[derive(QueryableByName)]
struct FacetRow {
    #[diesel(sql_type = Text)]
    primary_category: String,
    #[diesel(sql_type = Nullable<Text>)]
    subcategory: Option<String>,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Shared taxonomy-filter SQL for the retrieval arms. `$2` is the
/// canonical term, `$3` the primary category; both may be null.
const TAXONOMY_FILTER_SQL: &str = "\
    AND ($2::text IS NULL OR EXISTS ( \
        SELECT 1 FROM document_taxonomy_map m \
        JOIN taxonomy_terms t ON t.id = m.term_id \
        WHERE m.document_id = documents.id AND lower(t.term) = lower($2))) \
    AND ($3::text IS NULL OR EXISTS ( \
        SELECT 1 FROM document_taxonomy_map m \
        JOIN taxonomy_terms t ON t.id = m.term_id \
        WHERE m.document_id = documents.id \
          AND lower(t.primary_category) = lower($3)))";

fn filtered(filter: &DocumentFilter) -> documents::BoxedQuery<'_, diesel::pg::Pg> {
    let mut query = documents::table.into_boxed();

    if let Some(status) = filter.status {
        query = query.filter(documents::status.eq(status.as_str()));
    }

    if let Some(term) = &filter.canonical_term {
        let mapped_ids = document_taxonomy_map::table
            .inner_join(taxonomy_terms::table)
            .filter(taxonomy_terms::term.eq(term.clone()))
            .select(document_taxonomy_map::document_id);
        query = query.filter(documents::id.eq_any(mapped_ids));
    }

    if let Some(category) = &filter.primary_category {
        let mapped_ids = document_taxonomy_map::table
            .inner_join(taxonomy_terms::table)
            .filter(taxonomy_terms::primary_category.eq(category.clone()))
            .select(document_taxonomy_map::document_id);
        query = query.filter(documents::id.eq_any(mapped_ids));
    }

    if let Some(text) = &filter.free_text {
        query = query.filter(
            diesel::dsl::sql::<diesel::sql_types::Bool>(
                "full_text_index @@ plainto_tsquery('english', ",
            )
            .bind::<Text, _>(text.clone())
            .sql(")"),
        );
    }

    query
}

fn to_domain(model: DocumentModel) -> Result<Document, DocumentRepositoryError> {
    Document::try_from(model).map_err(DocumentRepositoryError::ValidationError)
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    async fn create(
        &self,
        filename: &str,
        blob_key: &str,
        size_bytes: Option<i64>,
    ) -> Result<Document, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let new_document = NewDocumentModel {
            filename,
            blob_key,
            size_bytes,
            status: DocumentStatus::Pending.as_str(),
            progress: 0,
        };

        let inserted: DocumentModel = diesel::insert_into(documents::table)
            .values(&new_document)
            .get_result(&mut conn)?;

        to_domain(inserted)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let model = documents::table
            .find(id)
            .first::<DocumentModel>(&mut conn)
            .optional()?;

        model.map(to_domain).transpose()
    }

    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<Document>, DocumentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;

        let models = documents::table
            .filter(documents::id.eq_any(ids))
            .load::<DocumentModel>(&mut conn)?;

        models.into_iter().map(to_domain).collect()
    }

    async fn update_status(
        &self,
        id: i32,
        status: DocumentStatus,
        progress: Option<i32>,
        error: Option<String>,
    ) -> Result<(), DocumentRepositoryError> {
        let mut conn = self.conn()?;

        conn.transaction::<_, DocumentRepositoryError, _>(|conn| {
            let current: DocumentModel = documents::table
                .find(id)
                .for_update()
                .first::<DocumentModel>(conn)
                .optional()?
                .ok_or(DocumentRepositoryError::NotFound(id))?;

            let from = DocumentStatus::from_str(&current.status)
                .map_err(DocumentRepositoryError::ValidationError)?;
            if !DocumentStatus::validate_transition(from, status).is_ok() {
                return Err(DocumentRepositoryError::InvalidTransition { from, to: status });
            }

            // Progress is monotonic within an attempt; a re-queue rewinds.
            let new_progress = match (status, progress) {
                (DocumentStatus::Queued, p) => p.unwrap_or(0).clamp(0, 100),
                (DocumentStatus::Completed, _) => 100,
                (_, Some(p)) => current.progress.max(p.clamp(0, 100)),
                (_, None) => current.progress,
            };

            let new_error = match status {
                DocumentStatus::Failed => {
                    let message = error.or(current.error);
                    Some(message.ok_or_else(|| {
                        DocumentRepositoryError::ValidationError(
                            "FAILED status requires an error message".to_string(),
                        )
                    })?)
                }
                DocumentStatus::Queued => None,
                _ => error.or(current.error),
            };

            let processed_at = if status == DocumentStatus::Completed {
                Some(Utc::now())
            } else {
                current.processed_at
            };

            diesel::update(documents::table.find(id))
                .set((
                    documents::status.eq(status.as_str()),
                    documents::progress.eq(new_progress),
                    documents::error.eq(new_error),
                    documents::processed_at.eq(processed_at),
                    documents::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            Ok(())
        })
    }

    async fn update_content(
        &self,
        id: i32,
        extracted_text: &str,
        ai_analysis: &AiAnalysis,
        keywords: &[String],
        metadata: Option<&serde_json::Value>,
        preview_key: Option<&str>,
    ) -> Result<(), DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let analysis_value = serde_json::to_value(ai_analysis)
            .map_err(|e| DocumentRepositoryError::ValidationError(e.to_string()))?;
        let keywords_value = serde_json::to_value(keywords)
            .map_err(|e| DocumentRepositoryError::ValidationError(e.to_string()))?;

        conn.transaction::<_, DocumentRepositoryError, _>(|conn| {
            let updated = diesel::update(documents::table.find(id))
                .set((
                    documents::extracted_text.eq(extracted_text),
                    documents::ai_analysis.eq(&analysis_value),
                    documents::keywords.eq(&keywords_value),
                    documents::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            if updated == 0 {
                return Err(DocumentRepositoryError::NotFound(id));
            }

            if let Some(metadata) = metadata {
                diesel::update(documents::table.find(id))
                    .set(documents::metadata.eq(metadata))
                    .execute(conn)?;
            }

            if let Some(preview_key) = preview_key {
                diesel::update(documents::table.find(id))
                    .set(documents::preview_key.eq(preview_key))
                    .execute(conn)?;
            }

            Ok(())
        })
    }

    async fn update_embedding(
        &self,
        id: i32,
        vector: &[f32],
    ) -> Result<(), DocumentRepositoryError> {
        if vector.len() != self.vector_dim {
            return Err(DocumentRepositoryError::DimensionMismatch {
                expected: self.vector_dim,
                actual: vector.len(),
            });
        }

        let mut conn = self.conn()?;

        let updated = diesel::update(documents::table.find(id))
            .set((
                documents::search_vector.eq(Vector::from(vector.to_vec())),
                documents::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if updated == 0 {
            return Err(DocumentRepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn update_preview_key(
        &self,
        id: i32,
        preview_key: &str,
    ) -> Result<(), DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let updated = diesel::update(documents::table.find(id))
            .set((
                documents::preview_key.eq(preview_key),
                documents::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if updated == 0 {
            return Err(DocumentRepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn reset_for_reprocessing(&self, id: i32) -> Result<(), DocumentRepositoryError> {
        let mut conn = self.conn()?;

        conn.transaction::<_, DocumentRepositoryError, _>(|conn| {
            let current: DocumentModel = documents::table
                .find(id)
                .for_update()
                .first::<DocumentModel>(conn)
                .optional()?
                .ok_or(DocumentRepositoryError::NotFound(id))?;

            let status = DocumentStatus::from_str(&current.status)
                .map_err(DocumentRepositoryError::ValidationError)?;
            if !status.can_reset_for_reprocessing() {
                return Err(DocumentRepositoryError::ConflictingState(
                    "Document is being processed; wait for a terminal state".to_string(),
                ));
            }

            diesel::update(documents::table.find(id))
                .set((
                    documents::status.eq(DocumentStatus::Queued.as_str()),
                    documents::progress.eq(0),
                    documents::error.eq(None::<String>),
                    documents::extracted_text.eq(None::<String>),
                    documents::ai_analysis.eq(None::<serde_json::Value>),
                    documents::keywords.eq(None::<serde_json::Value>),
                    documents::search_vector.eq(None::<Vector>),
                    documents::processed_at.eq(None::<DateTime<Utc>>),
                    documents::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            diesel::delete(
                document_taxonomy_map::table.filter(document_taxonomy_map::document_id.eq(id)),
            )
            .execute(conn)?;

            Ok(())
        })
    }

    async fn delete(&self, id: i32) -> Result<bool, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(documents::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    async fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort: SortKey,
        direction: SortDirection,
        page: PageRequest,
    ) -> Result<DocumentPage, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let total: i64 = filtered(filter).count().get_result(&mut conn)?;

        let mut query = filtered(filter);
        query = match (sort, direction) {
            (SortKey::Filename, SortDirection::Asc) => query.order(documents::filename.asc()),
            (SortKey::Filename, SortDirection::Desc) => query.order(documents::filename.desc()),
            (SortKey::Size, SortDirection::Asc) => query.order(documents::size_bytes.asc()),
            (SortKey::Size, SortDirection::Desc) => query.order(documents::size_bytes.desc()),
            // Relevance has no meaning at the store level; recency is the
            // deterministic stand-in.
            (_, SortDirection::Asc) => query.order(documents::created_at.asc()),
            (_, SortDirection::Desc) => {
                query.order((documents::created_at.desc(), documents::id.asc()))
            }
        };

        let models = query
            .offset(page.offset())
            .limit(page.per_page as i64)
            .load::<DocumentModel>(&mut conn)?;

        let rows = models
            .into_iter()
            .map(to_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentPage { rows, total })
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i32, f32)>, DocumentRepositoryError> {
        if query_vector.len() != self.vector_dim {
            return Err(DocumentRepositoryError::DimensionMismatch {
                expected: self.vector_dim,
                actual: query_vector.len(),
            });
        }

        let mut conn = self.conn()?;

        let sql = format!(
            "SELECT id, (1 - (search_vector <=> $1))::float4 AS score \
             FROM documents \
             WHERE status = 'COMPLETED' AND search_vector IS NOT NULL {} \
             ORDER BY search_vector <=> $1 ASC, id ASC \
             LIMIT $4",
            TAXONOMY_FILTER_SQL
        );

        let rows: Vec<IdScoreRow> = diesel::sql_query(sql)
            .bind::<pgvector::sql_types::Vector, _>(Vector::from(query_vector.to_vec()))
            .bind::<Nullable<Text>, _>(filter.canonical_term.as_deref())
            .bind::<Nullable<Text>, _>(filter.primary_category.as_deref())
            .bind::<BigInt, _>(k as i64)
            .load(&mut conn)?;

        Ok(rows.into_iter().map(|r| (r.id, r.score)).collect())
    }

    async fn fulltext_search(
        &self,
        query_text: &str,
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i32, f32)>, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let sql = format!(
            "SELECT id, ts_rank(full_text_index, plainto_tsquery('english', $1))::float4 AS score \
             FROM documents \
             WHERE status = 'COMPLETED' \
               AND full_text_index @@ plainto_tsquery('english', $1) {} \
             ORDER BY score DESC, id ASC \
             LIMIT $4",
            TAXONOMY_FILTER_SQL
        );

        let rows: Vec<IdScoreRow> = diesel::sql_query(sql)
            .bind::<Text, _>(query_text)
            .bind::<Nullable<Text>, _>(filter.canonical_term.as_deref())
            .bind::<Nullable<Text>, _>(filter.primary_category.as_deref())
            .bind::<BigInt, _>(k as i64)
            .load(&mut conn)?;

        Ok(rows.into_iter().map(|r| (r.id, r.score)).collect())
    }

    async fn replace_taxonomy_mappings(
        &self,
        document_id: i32,
        term_ids: &[i32],
    ) -> Result<(), DocumentRepositoryError> {
        let mut conn = self.conn()?;

        conn.transaction::<_, DocumentRepositoryError, _>(|conn| {
            diesel::delete(
                document_taxonomy_map::table
                    .filter(document_taxonomy_map::document_id.eq(document_id)),
            )
            .execute(conn)?;

            let rows: Vec<_> = term_ids
                .iter()
                .map(|term_id| {
                    (
                        document_taxonomy_map::document_id.eq(document_id),
                        document_taxonomy_map::term_id.eq(*term_id),
                    )
                })
                .collect();

            if !rows.is_empty() {
                diesel::insert_into(document_taxonomy_map::table)
                    .values(&rows)
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }

            Ok(())
        })
    }

    async fn taxonomy_term_ids(
        &self,
        document_id: i32,
    ) -> Result<Vec<i32>, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let ids = document_taxonomy_map::table
            .filter(document_taxonomy_map::document_id.eq(document_id))
            .select(document_taxonomy_map::term_id)
            .order(document_taxonomy_map::term_id.asc())
            .load::<i32>(&mut conn)?;

        Ok(ids)
    }

    async fn facet_counts(&self) -> Result<Vec<FacetCount>, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let rows: Vec<FacetRow> = diesel::sql_query(
            "SELECT t.primary_category AS primary_category, \
                    t.subcategory AS subcategory, \
                    COUNT(DISTINCT m.document_id) AS count \
             FROM document_taxonomy_map m \
             JOIN taxonomy_terms t ON t.id = m.term_id \
             JOIN documents d ON d.id = m.document_id \
             WHERE d.status = 'COMPLETED' AND t.primary_category IS NOT NULL \
             GROUP BY t.primary_category, t.subcategory \
             ORDER BY t.primary_category, t.subcategory",
        )
        .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| FacetCount {
                primary_category: r.primary_category,
                subcategory: r.subcategory,
                count: r.count,
            })
            .collect())
    }

    async fn find_stale(
        &self,
        statuses: &[DocumentStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Document>, DocumentRepositoryError> {
        let mut conn = self.conn()?;

        let status_strings: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let models = documents::table
            .filter(documents::status.eq_any(status_strings))
            .filter(documents::updated_at.lt(older_than))
            .order(documents::updated_at.asc())
            .load::<DocumentModel>(&mut conn)?;

        models.into_iter().map(to_domain).collect()
    }
}
