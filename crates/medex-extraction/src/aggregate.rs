use medex_core::{DocumentExtraction, ExtractionResult};

/// Concatenates per-document results, in submission order, into the three
/// batch-wide collections.
pub fn aggregate(documents: Vec<DocumentExtraction>) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    for document in documents {
        result.blocks.extend(document.blocks);
        result.lines.extend(document.lines);
        result.paragraphs.extend(document.paragraphs);
    }
    result
}
