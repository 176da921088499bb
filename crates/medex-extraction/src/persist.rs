use std::path::{Path, PathBuf};

use medex_core::error::Result;
use medex_core::{ExtractionResult, PageText};
use serde::Serialize;

pub const BLOCKS_FILE: &str = "extracted_blocks.json";
pub const LINES_FILE: &str = "extracted_lines.json";
pub const PARAGRAPHS_FILE: &str = "extracted_paragraphs.json";

fn to_pretty_json(pages: &[PageText]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    pages.serialize(&mut serializer)?;
    Ok(out)
}

/// Writes the three collections to `dir`, one JSON array of `{page, data}`
/// per file. Returns the written paths.
pub async fn persist_extraction(result: &ExtractionResult, dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut written = Vec::with_capacity(3);
    for (file, pages) in [
        (BLOCKS_FILE, &result.blocks),
        (LINES_FILE, &result.lines),
        (PARAGRAPHS_FILE, &result.paragraphs),
    ] {
        let path = dir.join(file);
        tokio::fs::write(&path, to_pretty_json(pages)?).await?;
        written.push(path);
    }

    tracing::info!(dir = %dir.display(), "Extraction saved");
    Ok(written)
}
