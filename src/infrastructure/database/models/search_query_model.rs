use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::database::schema::search_queries;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = search_queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SearchQueryModel {
    pub id: i32,
    pub query_text: String,
    pub actor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = search_queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewSearchQueryModel<'a> {
    pub query_text: &'a str,
    pub actor_id: Option<&'a str>,
}
