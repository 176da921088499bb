use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, instrument};

use medex_core::config::AppConfig;
use medex_core::error::{MedexError, Result};
use medex_core::extraction::ExtractionPipeline;
use medex_core::{
    BatchOcrService, DocumentExtraction, ExtractionResult, InputDocument, ObjectStore,
    OutputArtifact,
};

use crate::aggregate::aggregate;
use crate::cleanup::cleanup;
use crate::fetch::fetch_outputs;
use crate::persist::persist_extraction;
use crate::submit::{submit, SubmitTarget};
use crate::wait::{await_job, WaitOptions};

/// Stages of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Submitting,
    Waiting,
    Fetching,
    Aggregating,
    CleaningUp,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target: SubmitTarget,
    pub wait: WaitOptions,
    /// Process documents on concurrent tasks instead of one at a time.
    pub parallel: bool,
    /// Save the three collections here after each successful batch.
    pub persist_dir: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            target: SubmitTarget {
                project_id: config.gcp_project_id.clone(),
                location: config.gcp_location.clone(),
                processor_id: config.gcp_processor_id.clone(),
                output_bucket: config.gcp_bucket_name.clone(),
                results_prefix: "results".to_string(),
                field_mask: config.field_mask.clone(),
            },
            wait: WaitOptions {
                timeout: Duration::from_secs(config.job_timeout_secs),
                poll_interval: Duration::from_secs(config.poll_interval_secs),
            },
            parallel: config.parallel,
            persist_dir: config.persist_dir.as_ref().map(PathBuf::from),
        }
    }
}

/// What one document leaves behind: its text, and the artifacts to delete.
struct DocumentOutcome {
    extraction: DocumentExtraction,
    artifacts: Vec<OutputArtifact>,
}

/// Tracks and logs stage transitions of a run.
struct BatchRun {
    stage: PipelineStage,
    documents: usize,
}

impl BatchRun {
    fn new(documents: usize) -> Self {
        Self {
            stage: PipelineStage::Idle,
            documents,
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(from = ?self.stage, to = ?stage, documents = self.documents, "Pipeline stage");
        self.stage = stage;
    }

    fn fail(&mut self, error: &MedexError) {
        error!(stage = ?self.stage, error = %error, "Batch extraction failed");
        self.stage = PipelineStage::Failed;
    }
}

/// Submit → wait → fetch for a single document.
#[instrument(skip_all, fields(input = %document.uri))]
async fn process_document(
    ocr: &dyn BatchOcrService,
    store: &dyn ObjectStore,
    options: &PipelineOptions,
    run: &mut BatchRun,
    document: &InputDocument,
) -> Result<DocumentOutcome> {
    run.enter(PipelineStage::Submitting);
    let handle = submit(ocr, &options.target, document).await?;

    run.enter(PipelineStage::Waiting);
    let metadata = await_job(ocr, &handle, options.wait).await?;

    run.enter(PipelineStage::Fetching);
    let fetched = fetch_outputs(store, &metadata).await?;

    info!(
        pages = fetched.pages.len(),
        artifacts = fetched.artifacts.len(),
        "Document processed"
    );

    Ok(DocumentOutcome {
        extraction: DocumentExtraction::from_pages(fetched.pages),
        artifacts: fetched.artifacts,
    })
}

/// Batch OCR extraction over a remote processor and an object store.
pub struct BatchExtractionPipeline {
    ocr: Arc<dyn BatchOcrService>,
    store: Arc<dyn ObjectStore>,
    options: PipelineOptions,
}

impl BatchExtractionPipeline {
    pub fn new(
        ocr: Arc<dyn BatchOcrService>,
        store: Arc<dyn ObjectStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            ocr,
            store,
            options,
        }
    }

    async fn process_sequential(
        &self,
        run: &mut BatchRun,
        documents: &[InputDocument],
    ) -> Result<Vec<DocumentOutcome>> {
        let mut outcomes = Vec::with_capacity(documents.len());
        for document in documents {
            let outcome = process_document(
                self.ocr.as_ref(),
                self.store.as_ref(),
                &self.options,
                run,
                document,
            )
            .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn process_parallel(
        &self,
        run: &mut BatchRun,
        documents: &[InputDocument],
    ) -> Result<Vec<DocumentOutcome>> {
        run.enter(PipelineStage::Submitting);
        let mut join_set = tokio::task::JoinSet::new();

        for (i, document) in documents.iter().enumerate() {
            let ocr = self.ocr.clone();
            let store = self.store.clone();
            let options = self.options.clone();
            let document = document.clone();

            join_set.spawn(async move {
                let mut task_run = BatchRun::new(1);
                let outcome =
                    process_document(ocr.as_ref(), store.as_ref(), &options, &mut task_run, &document)
                        .await;
                (i, outcome)
            });
        }

        run.enter(PipelineStage::Waiting);
        let mut slots: Vec<Option<DocumentOutcome>> = documents.iter().map(|_| None).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((i, Ok(outcome))) => slots[i] = Some(outcome),
                Ok((i, Err(e))) => {
                    error!(document_index = i, source = %documents[i].uri, error = %e, "Document failed, aborting batch");
                    join_set.abort_all();
                    return Err(e);
                }
                Err(join_err) => {
                    join_set.abort_all();
                    return Err(MedexError::Internal(format!("Task join error: {join_err}")));
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| MedexError::Internal(format!("Document {i} produced no result")))
            })
            .collect()
    }

    async fn execute(&self, run: &mut BatchRun, documents: &[InputDocument]) -> Result<ExtractionResult> {
        let outcomes = if self.options.parallel {
            self.process_parallel(run, documents).await?
        } else {
            self.process_sequential(run, documents).await?
        };

        run.enter(PipelineStage::Aggregating);
        let mut artifacts = Vec::new();
        let mut extractions = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            artifacts.extend(outcome.artifacts);
            extractions.push(outcome.extraction);
        }
        let result = aggregate(extractions);

        // Every artifact's content is in `result` by now.
        run.enter(PipelineStage::CleaningUp);
        let report = cleanup(self.store.as_ref(), &artifacts).await;
        if !report.failed.is_empty() {
            tracing::warn!(failed = report.failed.len(), deleted = report.deleted, "Cleanup incomplete");
        }

        if let Some(dir) = &self.options.persist_dir {
            persist_extraction(&result, dir).await?;
        }

        run.enter(PipelineStage::Done);
        Ok(result)
    }
}

#[async_trait]
impl ExtractionPipeline for BatchExtractionPipeline {
    async fn extract_batch(&self, documents: &[InputDocument]) -> Result<ExtractionResult> {
        info!(count = documents.len(), parallel = self.options.parallel, "Starting batch extraction");

        let mut run = BatchRun::new(documents.len());
        match self.execute(&mut run, documents).await {
            Ok(result) => {
                info!(
                    blocks = result.blocks.len(),
                    lines = result.lines.len(),
                    paragraphs = result.paragraphs.len(),
                    "Batch extraction completed"
                );
                Ok(result)
            }
            Err(e) => {
                run.fail(&e);
                Err(e)
            }
        }
    }
}
