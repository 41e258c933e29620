use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::Document;

/// Full document record minus the stored bytes.
#[derive(Debug, Serialize)]
pub struct DocumentDetailDto {
    pub id: i32,
    pub filename: String,
    pub size_bytes: Option<i64>,
    pub status: String,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<serde_json::Value>,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub canonical_terms: Vec<String>,
    pub mapping_count: usize,
    pub has_embedding: bool,
    pub has_preview: bool,
}

impl From<&Document> for DocumentDetailDto {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id(),
            filename: document.filename().to_string(),
            size_bytes: document.size_bytes(),
            status: document.status().to_string(),
            progress: document.progress(),
            error: document.error().map(|e| e.to_string()),
            created_at: document.created_at(),
            updated_at: document.updated_at(),
            processed_at: document.processed_at(),
            extracted_text: document.extracted_text().map(|t| t.to_string()),
            ai_analysis: document
                .ai_analysis()
                .and_then(|a| serde_json::to_value(a).ok()),
            keywords: document.keywords().to_vec(),
            metadata: document.metadata().cloned(),
            canonical_terms: document.canonical_terms(),
            mapping_count: document.mapping_count(),
            has_embedding: document.search_vector().is_some(),
            has_preview: document.preview_key().is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentStatusDto {
    pub status: String,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Document> for DocumentStatusDto {
    fn from(document: &Document) -> Self {
        Self {
            status: document.status().to_string(),
            progress: document.progress(),
            error: document.error().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadedDocumentDto {
    pub id: i32,
    pub filename: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponseDto {
    pub documents: Vec<UploadedDocumentDto>,
}

#[derive(Debug, Serialize)]
pub struct ReprocessResponseDto {
    pub success: bool,
    pub document_id: i32,
}
