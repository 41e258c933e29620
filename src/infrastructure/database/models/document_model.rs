use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;

use crate::domain::entities::{AiAnalysis, Document};
use crate::domain::value_objects::DocumentStatus;
use crate::infrastructure::database::schema::documents;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocumentModel {
    pub id: i32,
    pub filename: String,
    pub blob_key: String,
    pub size_bytes: Option<i64>,
    pub status: String,
    pub progress: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub extracted_text: Option<String>,
    pub ai_analysis: Option<serde_json::Value>,
    pub keywords: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub search_vector: Option<Vector>,
    pub preview_key: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDocumentModel<'a> {
    pub filename: &'a str,
    pub blob_key: &'a str,
    pub size_bytes: Option<i64>,
    pub status: &'a str,
    pub progress: i32,
}

impl TryFrom<DocumentModel> for Document {
    type Error = String;

    fn try_from(model: DocumentModel) -> Result<Self, Self::Error> {
        let status = DocumentStatus::from_str(&model.status)?;

        let ai_analysis: Option<AiAnalysis> = match model.ai_analysis {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| format!("Invalid ai_analysis payload: {}", e))?,
            ),
            None => None,
        };

        let keywords: Vec<String> = match model.keywords {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| format!("Invalid keywords payload: {}", e))?,
            None => Vec::new(),
        };

        Ok(Document::from_database(
            model.id,
            model.filename,
            model.blob_key,
            model.size_bytes,
            status,
            model.progress,
            model.error,
            model.created_at,
            model.updated_at,
            model.processed_at,
            model.extracted_text,
            ai_analysis,
            keywords,
            model.metadata,
            model.search_vector.map(|v| v.to_vec()),
            model.preview_key,
        ))
    }
}
