use serde::{Deserialize, Serialize};

/// A source file in object storage, submitted for OCR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDocument {
    pub uri: String,
    pub mime_type: String,
}

impl InputDocument {
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn pdf(uri: impl Into<String>) -> Self {
        Self::new(uri, "application/pdf")
    }
}

/// One file produced by a batch job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputArtifact {
    pub bucket: String,
    pub name: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

impl OutputArtifact {
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    pub fn has_content_type(&self, expected: &str) -> bool {
        self.content_type.as_deref() == Some(expected)
    }
}

/// Text resolved for one region kind on one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    pub page: i32,
    pub data: Vec<String>,
}

/// All region texts resolved for one page of one output artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub page_number: i32,
    pub blocks: Vec<String>,
    pub lines: Vec<String>,
    pub paragraphs: Vec<String>,
}

/// Per-document extraction, one entry per page per artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentExtraction {
    pub blocks: Vec<PageText>,
    pub lines: Vec<PageText>,
    pub paragraphs: Vec<PageText>,
}

impl DocumentExtraction {
    pub fn from_pages(pages: Vec<ExtractedPage>) -> Self {
        let mut extraction = Self::default();
        for page in pages {
            extraction.blocks.push(PageText {
                page: page.page_number,
                data: page.blocks,
            });
            extraction.lines.push(PageText {
                page: page.page_number,
                data: page.lines,
            });
            extraction.paragraphs.push(PageText {
                page: page.page_number,
                data: page.paragraphs,
            });
        }
        extraction
    }
}

/// Flattened output of a whole batch, in submission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResult {
    pub blocks: Vec<PageText>,
    pub lines: Vec<PageText>,
    pub paragraphs: Vec<PageText>,
}

/// Which collection of an [`ExtractionResult`] is handed downstream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransformInput {
    Blocks,
    Lines,
    #[default]
    Paragraphs,
}

impl ExtractionResult {
    pub fn collection(&self, input: TransformInput) -> &[PageText] {
        match input {
            TransformInput::Blocks => &self.blocks,
            TransformInput::Lines => &self.lines,
            TransformInput::Paragraphs => &self.paragraphs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.lines.is_empty() && self.paragraphs.is_empty()
    }
}
