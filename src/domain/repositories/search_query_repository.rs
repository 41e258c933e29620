use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::TopQuery;

#[derive(Debug)]
pub enum SearchQueryRepositoryError {
    DatabaseError(String),
}

impl std::fmt::Display for SearchQueryRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchQueryRepositoryError::DatabaseError(msg) => {
                write!(f, "Database error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SearchQueryRepositoryError {}

#[async_trait]
pub trait SearchQueryRepository: Send + Sync {
    async fn record(
        &self,
        query_text: &str,
        actor_id: Option<&str>,
    ) -> Result<(), SearchQueryRepositoryError>;

    async fn top_queries(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopQuery>, SearchQueryRepositoryError>;
}
