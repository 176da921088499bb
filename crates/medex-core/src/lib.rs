pub mod api_types;
pub mod config;
pub mod credentials;
pub mod document;
pub mod error;
pub mod extraction;
pub mod ocr;
pub mod storage;
pub mod transform;

pub use config::{AppConfig, CredentialsSource};
pub use credentials::{CredentialsHandle, CredentialsProvider, EnvCredentials, JsonCredentials};
pub use document::{
    DocumentExtraction, ExtractedPage, ExtractionResult, InputDocument, OutputArtifact, PageText,
    TransformInput,
};
pub use error::{MedexError, Result};
pub use extraction::ExtractionPipeline;
pub use ocr::{BatchOcrService, BatchProcessMetadata, JobHandle, JobSnapshot, JobState};
pub use storage::{ObjectStore, StorageLocation};
pub use transform::{FieldValue, MedicalRecord, TransformService};
