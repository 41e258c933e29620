use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::AiAnalysis;
use crate::domain::value_objects::{DocumentStatus, TransitionResult};

/// The central catalog entity. Owned by the store; a pipeline worker holds
/// a logical lease while the status is PROCESSING.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: i32,
    filename: String,
    blob_key: String,
    size_bytes: Option<i64>,
    status: DocumentStatus,
    progress: i32,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    extracted_text: Option<String>,
    ai_analysis: Option<AiAnalysis>,
    keywords: Vec<String>,
    metadata: Option<serde_json::Value>,
    search_vector: Option<Vec<f32>>,
    preview_key: Option<String>,
}

impl Document {
    /// Reconstruct a document from persisted values.
    #[allow(clippy::too_many_arguments)]
    pub fn from_database(
        id: i32,
        filename: String,
        blob_key: String,
        size_bytes: Option<i64>,
        status: DocumentStatus,
        progress: i32,
        error: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        processed_at: Option<DateTime<Utc>>,
        extracted_text: Option<String>,
        ai_analysis: Option<AiAnalysis>,
        keywords: Vec<String>,
        metadata: Option<serde_json::Value>,
        search_vector: Option<Vec<f32>>,
        preview_key: Option<String>,
    ) -> Self {
        Self {
            id,
            filename,
            blob_key,
            size_bytes,
            status,
            progress,
            error,
            created_at,
            updated_at,
            processed_at,
            extracted_text,
            ai_analysis,
            keywords,
            metadata,
            search_vector,
            preview_key,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn blob_key(&self) -> &str {
        &self.blob_key
    }

    pub fn size_bytes(&self) -> Option<i64> {
        self.size_bytes
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    pub fn ai_analysis(&self) -> Option<&AiAnalysis> {
        self.ai_analysis.as_ref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    pub fn search_vector(&self) -> Option<&[f32]> {
        self.search_vector.as_deref()
    }

    pub fn preview_key(&self) -> Option<&str> {
        self.preview_key.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.ai_analysis.as_ref()?.summary.as_deref()
    }

    pub fn canonical_terms(&self) -> Vec<String> {
        self.ai_analysis
            .as_ref()
            .map(|a| a.canonical_terms())
            .unwrap_or_default()
    }

    pub fn mapping_count(&self) -> usize {
        self.ai_analysis
            .as_ref()
            .map(|a| a.mapping_count())
            .unwrap_or(0)
    }

    /// A COMPLETED document must carry text, analysis and an embedding.
    /// Anything short of that is incomplete and eligible for reprocessing.
    pub fn derived_fields_complete(&self) -> bool {
        self.extracted_text.is_some()
            && self
                .ai_analysis
                .as_ref()
                .is_some_and(|a| a.summary.is_some())
            && self.search_vector.is_some()
    }

    pub fn is_incomplete(&self) -> bool {
        self.status == DocumentStatus::Completed && !self.derived_fields_complete()
    }

    /// Apply a status change, enforcing the transition rules and progress
    /// monotonicity within an attempt. Mutates nothing on rejection.
    pub fn apply_status(
        &mut self,
        status: DocumentStatus,
        progress: Option<i32>,
        error: Option<String>,
    ) -> TransitionResult {
        let result = DocumentStatus::validate_transition(self.status, status);
        if !result.is_ok() {
            return result;
        }

        self.status = status;
        if let Some(progress) = progress {
            let clamped = progress.clamp(0, 100);
            // Monotonic within an attempt; a re-queue starts over.
            if status == DocumentStatus::Queued {
                self.progress = clamped;
            } else {
                self.progress = self.progress.max(clamped);
            }
        }
        if let Some(error) = error {
            self.error = Some(error);
        }
        if status == DocumentStatus::Completed {
            self.progress = 100;
            self.processed_at = Some(Utc::now());
        }
        self.updated_at = Utc::now();
        TransitionResult::Ok
    }

    /// Attach the results of a successful analysis pass.
    pub fn set_content(
        &mut self,
        extracted_text: String,
        ai_analysis: AiAnalysis,
        keywords: Vec<String>,
        metadata: Option<serde_json::Value>,
        preview_key: Option<String>,
    ) {
        self.extracted_text = Some(extracted_text);
        self.ai_analysis = Some(ai_analysis);
        self.keywords = keywords;
        if metadata.is_some() {
            self.metadata = metadata;
        }
        if preview_key.is_some() {
            self.preview_key = preview_key;
        }
        self.updated_at = Utc::now();
    }

    pub fn set_embedding(&mut self, vector: Vec<f32>) {
        self.search_vector = Some(vector);
        self.updated_at = Utc::now();
    }

    pub fn set_preview_key(&mut self, preview_key: String) {
        self.preview_key = Some(preview_key);
        self.updated_at = Utc::now();
    }

    /// Clear derived fields and rewind the lifecycle for a reprocess run.
    pub fn reset_for_reprocessing(&mut self) {
        self.extracted_text = None;
        self.ai_analysis = None;
        self.keywords = Vec::new();
        self.search_vector = None;
        self.status = DocumentStatus::Queued;
        self.progress = 0;
        self.error = None;
        self.processed_at = None;
        self.updated_at = Utc::now();
    }
}
