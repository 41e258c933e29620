use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only analytics record for a search. Only aggregated into
/// top-query counts; never read back individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: i32,
    pub query_text: String,
    pub actor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopQuery {
    pub query_text: String,
    pub count: i64,
}
