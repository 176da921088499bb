use medex_core::error::{MedexError, Result};
use medex_core::ocr::{BatchProcessMetadata, OcrDocument};
use medex_core::{ExtractedPage, ObjectStore, OutputArtifact, StorageLocation};

use crate::text::{extract_page, TextIndex};

/// The only artifact type the OCR service writes for parsed documents.
pub const DOCUMENT_CONTENT_TYPE: &str = "application/json";

/// Pages parsed from one job's outputs, and every artifact seen while
/// listing them (parsed or not) for later cleanup.
#[derive(Debug, Default)]
pub struct FetchedOutputs {
    pub pages: Vec<ExtractedPage>,
    pub artifacts: Vec<OutputArtifact>,
}

/// Decodes one artifact's bytes into pages of resolved text.
pub fn parse_document(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
    let document: OcrDocument = serde_json::from_slice(bytes)?;
    let index = TextIndex::new(&document.text);
    Ok(document.pages.iter().map(|page| extract_page(page, &index)).collect())
}

/// Lists, downloads and parses every output a completed job reported.
///
/// Unparseable output locations and artifacts of other content types are
/// logged and skipped. Pages are appended in listing order; the same page
/// number appearing in several artifacts yields several entries.
pub async fn fetch_outputs(
    store: &dyn ObjectStore,
    metadata: &BatchProcessMetadata,
) -> Result<FetchedOutputs> {
    let mut fetched = FetchedOutputs::default();

    for status in &metadata.individual_process_statuses {
        let location = match StorageLocation::parse(&status.output_gcs_destination) {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(
                    destination = %status.output_gcs_destination,
                    error = %e,
                    "Skipping output entry"
                );
                continue;
            }
        };

        let artifacts = store.list(&location.bucket, &location.prefix).await?;
        tracing::info!(location = %location.uri(), count = artifacts.len(), "Output files listed");

        for artifact in artifacts {
            fetched.artifacts.push(artifact.clone());

            if !artifact.has_content_type(DOCUMENT_CONTENT_TYPE) {
                let skipped = MedexError::UnsupportedArtifactType {
                    name: artifact.name.clone(),
                    content_type: artifact.content_type.clone().unwrap_or_default(),
                };
                tracing::warn!(error = %skipped, "Skipping non-supported file");
                continue;
            }

            tracing::info!(artifact = %artifact.uri(), "Fetching output file");
            let bytes = store.download(&artifact).await?;
            let pages = parse_document(&bytes)?;
            tracing::debug!(artifact = %artifact.name, pages = pages.len(), "Output file parsed");
            fetched.pages.extend(pages);
        }
    }

    Ok(fetched)
}
