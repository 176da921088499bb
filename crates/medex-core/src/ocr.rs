use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::document::InputDocument;
use crate::error::Result;

// ── Job submission and status ──────────────────────────────────────────────

/// One asynchronous OCR job request: exactly one input document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchProcessRequest {
    pub processor_path: String,
    pub input: InputDocument,
    pub output_uri_prefix: String,
    pub field_mask: Option<String>,
}

/// Opaque name of a submitted long-running operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    StateUnspecified,
    Waiting,
    Running,
    Succeeded,
    Cancelling,
    Cancelled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Cancelled | JobState::Failed)
    }
}

/// Per-input status reported by a batch job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndividualProcessStatus {
    #[serde(default)]
    pub input_gcs_source: String,
    #[serde(default)]
    pub output_gcs_destination: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessMetadata {
    #[serde(default)]
    pub state: JobState,
    #[serde(default)]
    pub state_message: String,
    #[serde(default)]
    pub individual_process_statuses: Vec<IndividualProcessStatus>,
}

/// A single observation of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSnapshot {
    pub done: bool,
    pub metadata: BatchProcessMetadata,
}

/// A remote batch OCR service with long-running operations.
#[async_trait]
pub trait BatchOcrService: Send + Sync {
    /// Starts the job and returns without waiting for it.
    async fn submit(&self, request: &BatchProcessRequest) -> Result<JobHandle>;

    /// Reads the current state of a job.
    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot>;
}

// ── Decoded output document ────────────────────────────────────────────────

/// Page-structured document written by the OCR service. Unknown fields are
/// ignored and every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrDocument {
    pub text: String,
    pub pages: Vec<OcrPage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Block,
    Line,
    Paragraph,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrPage {
    pub page_number: i32,
    pub blocks: Vec<OcrRegion>,
    pub lines: Vec<OcrRegion>,
    pub paragraphs: Vec<OcrRegion>,
}

impl OcrPage {
    pub fn regions(&self, kind: RegionKind) -> &[OcrRegion] {
        match kind {
            RegionKind::Block => &self.blocks,
            RegionKind::Line => &self.lines,
            RegionKind::Paragraph => &self.paragraphs,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrRegion {
    pub layout: Option<Layout>,
}

impl OcrRegion {
    pub fn segments(&self) -> &[TextSegment] {
        self.layout
            .as_ref()
            .and_then(|l| l.text_anchor.as_ref())
            .map(|a| a.text_segments.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Layout {
    pub text_anchor: Option<TextAnchor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TextAnchor {
    pub text_segments: Vec<TextSegment>,
}

/// Half-open range of character offsets into [`OcrDocument::text`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TextSegment {
    #[serde(deserialize_with = "int64")]
    pub start_index: u64,
    #[serde(deserialize_with = "int64")]
    pub end_index: u64,
}

impl TextSegment {
    pub fn new(start_index: u64, end_index: u64) -> Self {
        Self {
            start_index,
            end_index,
        }
    }
}

/// The provider's JSON mapping writes 64-bit integers as strings.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
