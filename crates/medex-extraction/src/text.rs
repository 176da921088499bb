//! Offset-based text reconstruction.
//!
//! The OCR service addresses every detected region by character offsets into
//! one whole-document text blob. Offsets count characters, not bytes, so the
//! blob is indexed once per document and each region is sliced from that
//! index.

use medex_core::ocr::{OcrPage, OcrRegion, RegionKind, TextSegment};
use medex_core::ExtractedPage;

/// Character-offset index over a document's text.
pub struct TextIndex<'a> {
    text: &'a str,
    /// Byte position of every character, plus `text.len()` as the final entry.
    boundaries: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    /// Number of characters in the text.
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Characters `[start, end)`. Offsets past the end are clamped and an
    /// inverted range is empty.
    pub fn slice(&self, start: u64, end: u64) -> &'a str {
        let len = self.char_len();
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
        let end = usize::try_from(end).unwrap_or(usize::MAX).min(len);
        if start >= end {
            if start > end {
                tracing::debug!(start, end, "Inverted text segment resolved to empty text");
            }
            return "";
        }
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }

    /// Concatenates every segment in order. No segments yields "".
    pub fn resolve(&self, segments: &[TextSegment]) -> String {
        segments
            .iter()
            .map(|s| self.slice(s.start_index, s.end_index))
            .collect()
    }
}

/// Resolves `segments` against `text` in one call.
pub fn resolve(text: &str, segments: &[TextSegment]) -> String {
    if segments.is_empty() {
        return String::new();
    }
    TextIndex::new(text).resolve(segments)
}

/// One string per region, in region order.
pub fn extract_regions(regions: &[OcrRegion], index: &TextIndex<'_>) -> Vec<String> {
    regions.iter().map(|r| index.resolve(r.segments())).collect()
}

/// Resolves the blocks, lines and paragraphs of one page.
pub fn extract_page(page: &OcrPage, index: &TextIndex<'_>) -> ExtractedPage {
    let blocks = extract_regions(page.regions(RegionKind::Block), index);
    let lines = extract_regions(page.regions(RegionKind::Line), index);
    let paragraphs = extract_regions(page.regions(RegionKind::Paragraph), index);

    tracing::debug!(
        page = page.page_number,
        blocks = blocks.len(),
        lines = lines.len(),
        paragraphs = paragraphs.len(),
        "Regions detected"
    );

    ExtractedPage {
        page_number: page.page_number,
        blocks,
        lines,
        paragraphs,
    }
}
