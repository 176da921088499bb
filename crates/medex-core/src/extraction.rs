use async_trait::async_trait;

use crate::document::{ExtractionResult, InputDocument};
use crate::error::Result;

#[async_trait]
pub trait ExtractionPipeline: Send + Sync {
    /// Runs OCR over every document in order and flattens the page text.
    /// Any failed document fails the whole batch.
    async fn extract_batch(&self, documents: &[InputDocument]) -> Result<ExtractionResult>;
}
