use medex_core::error::Result;
use medex_core::ocr::{BatchOcrService, BatchProcessRequest, JobHandle};
use medex_core::InputDocument;
use uuid::Uuid;

/// Where the processor lives and where its output goes.
#[derive(Debug, Clone)]
pub struct SubmitTarget {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
    pub output_bucket: String,
    pub results_prefix: String,
    pub field_mask: Option<String>,
}

impl SubmitTarget {
    pub fn processor_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }

    /// A fresh output prefix so concurrent submissions never share one.
    pub fn output_prefix(&self) -> String {
        let prefix = self.results_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("gs://{}/{}/", self.output_bucket, Uuid::new_v4())
        } else {
            format!("gs://{}/{}/{}/", self.output_bucket, prefix, Uuid::new_v4())
        }
    }

    pub fn build_request(&self, document: &InputDocument) -> BatchProcessRequest {
        BatchProcessRequest {
            processor_path: self.processor_path(),
            input: document.clone(),
            output_uri_prefix: self.output_prefix(),
            field_mask: self.field_mask.clone(),
        }
    }
}

/// Starts one OCR job for `document` and returns without waiting.
pub async fn submit(
    ocr: &dyn BatchOcrService,
    target: &SubmitTarget,
    document: &InputDocument,
) -> Result<JobHandle> {
    let request = target.build_request(document);
    let handle = ocr.submit(&request).await?;

    tracing::info!(
        operation = %handle,
        input = %document.uri,
        output = %request.output_uri_prefix,
        "Submitted batch OCR job"
    );

    Ok(handle)
}
