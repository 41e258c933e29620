use serde::Deserialize;

use crate::application::services::search_service::SearchRequest;
use crate::domain::repositories::{SortDirection, SortKey};

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    crate::application::services::search_service::DEFAULT_PER_PAGE
}

#[derive(Debug, Deserialize)]
pub struct SearchParamsDto {
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub canonical_term: Option<String>,
    pub primary_category: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

impl SearchParamsDto {
    /// Parse string parameters into the typed request; unknown sort keys
    /// or directions are a semantic validation error.
    pub fn into_request(self, actor_id: Option<String>) -> Result<SearchRequest, String> {
        let sort_by = match self.sort_by.as_deref() {
            None | Some("relevance") => SortKey::Relevance,
            Some("created_at") => SortKey::CreatedAt,
            Some("filename") => SortKey::Filename,
            Some("size") => SortKey::Size,
            Some(other) => return Err(format!("Unknown sort_by: {}", other)),
        };

        let sort_direction = match self.sort_direction.as_deref() {
            None | Some("desc") => SortDirection::Desc,
            Some("asc") => SortDirection::Asc,
            Some(other) => return Err(format!("Unknown sort_direction: {}", other)),
        };

        if self.per_page < 1 || self.per_page > 50 {
            return Err("per_page must be between 1 and 50".to_string());
        }
        if self.page < 1 {
            return Err("page must be at least 1".to_string());
        }

        Ok(SearchRequest {
            q: self.q,
            canonical_term: self.canonical_term,
            primary_category: self.primary_category,
            sort_by,
            sort_direction,
            page: self.page,
            per_page: self.per_page,
            debug: self.debug,
            actor_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParamsDto {
    pub q: Option<String>,
}
