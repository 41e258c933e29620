use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::TopQuery;
use crate::domain::repositories::search_query_repository::{
    SearchQueryRepository, SearchQueryRepositoryError,
};
use crate::infrastructure::database::models::NewSearchQueryModel;
use crate::infrastructure::database::schema::search_queries;
use crate::infrastructure::database::{get_connection_from_pool, DbConnection, DbPool};

pub struct PostgresSearchQueryRepository {
    pool: DbPool,
}

impl PostgresSearchQueryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConnection, SearchQueryRepositoryError> {
        get_connection_from_pool(&self.pool)
            .map_err(|e| SearchQueryRepositoryError::DatabaseError(e.to_string()))
    }
}

#[async_trait]
impl SearchQueryRepository for PostgresSearchQueryRepository {
    async fn record(
        &self,
        query_text: &str,
        actor_id: Option<&str>,
    ) -> Result<(), SearchQueryRepositoryError> {
        let mut conn = self.conn()?;

        let new_query = NewSearchQueryModel {
            query_text,
            actor_id,
        };

        diesel::insert_into(search_queries::table)
            .values(&new_query)
            .execute(&mut conn)
            .map_err(|e| SearchQueryRepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn top_queries(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopQuery>, SearchQueryRepositoryError> {
        let mut conn = self.conn()?;

        let rows: Vec<(String, i64)> = search_queries::table
            .filter(search_queries::created_at.ge(since))
            .group_by(search_queries::query_text)
            .select((
                search_queries::query_text,
                diesel::dsl::count(search_queries::id),
            ))
            .order(diesel::dsl::count(search_queries::id).desc())
            .limit(limit as i64)
            .load(&mut conn)
            .map_err(|e| SearchQueryRepositoryError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(query_text, count)| TopQuery { query_text, count })
            .collect())
    }
}
