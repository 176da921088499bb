use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{ExtractionResult, TransformInput};
use crate::transform::MedicalRecord;

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub processor: String,
    pub bucket: String,
}

// --- Uploads ---

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub uri: String,
    pub size: usize,
}

// --- Extractions ---

fn default_analyze() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub document_uris: Vec<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default = "default_analyze")]
    pub analyze: bool,
    #[serde(default)]
    pub transform_input: TransformInput,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionTriggerResponse {
    pub run_id: Uuid,
    pub status: ExtractionRunState,
    pub documents: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRunState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRunStatus {
    pub run_id: Uuid,
    pub status: ExtractionRunState,
    pub document_uris: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub extraction: Option<ExtractionResult>,
    pub record: Option<MedicalRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionRunsResponse {
    pub runs: Vec<ExtractionRunStatus>,
}
