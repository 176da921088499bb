//! Batch OCR extraction: submit each document as an asynchronous job, wait
//! for it, fetch and parse its output files into page text, then delete the
//! transient outputs.

pub mod aggregate;
pub mod cleanup;
pub mod fetch;
pub mod persist;
pub mod pipeline;
pub mod submit;
pub mod text;
pub mod wait;

pub use aggregate::aggregate;
pub use cleanup::{cleanup, CleanupReport};
pub use fetch::{fetch_outputs, parse_document, FetchedOutputs, DOCUMENT_CONTENT_TYPE};
pub use persist::persist_extraction;
pub use pipeline::{BatchExtractionPipeline, PipelineOptions, PipelineStage};
pub use submit::{submit, SubmitTarget};
pub use text::{extract_regions, resolve, TextIndex};
pub use wait::{await_job, wait_for_completion, WaitOptions, WaitOutcome};
