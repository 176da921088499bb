use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use medex_core::error::{MedexError, Result};
use medex_core::ocr::{BatchOcrService, BatchProcessMetadata, BatchProcessRequest, JobHandle, JobSnapshot};

use crate::auth::ServiceAccountTokenSource;
use crate::ensure_success;

// ── Document AI v1 REST types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchProcessBody {
    input_documents: InputDocuments,
    document_output_config: DocumentOutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputDocuments {
    gcs_documents: GcsDocuments,
}

#[derive(Debug, Serialize)]
struct GcsDocuments {
    documents: Vec<GcsDocument>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsDocument {
    gcs_uri: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentOutputConfig {
    gcs_output_config: GcsOutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsOutputConfig {
    gcs_uri: String,
    /// FieldMask in its JSON form: comma-separated paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    field_mask: Option<String>,
}

impl From<&BatchProcessRequest> for BatchProcessBody {
    fn from(request: &BatchProcessRequest) -> Self {
        BatchProcessBody {
            input_documents: InputDocuments {
                gcs_documents: GcsDocuments {
                    documents: vec![GcsDocument {
                        gcs_uri: request.input.uri.clone(),
                        mime_type: request.input.mime_type.clone(),
                    }],
                },
            },
            document_output_config: DocumentOutputConfig {
                gcs_output_config: GcsOutputConfig {
                    gcs_uri: request.output_uri_prefix.clone(),
                    field_mask: request.field_mask.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metadata: Option<BatchProcessMetadata>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl Operation {
    fn into_snapshot(self) -> JobSnapshot {
        let mut metadata = self.metadata.unwrap_or_default();
        if let Some(error) = self.error {
            if metadata.state_message.is_empty() {
                metadata.state_message = format!("{} (code {})", error.message, error.code);
            }
        }
        JobSnapshot {
            done: self.done,
            metadata,
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────────────

/// Document AI batch processing against a regional endpoint.
pub struct DocumentAiClient {
    client: Client,
    auth: Arc<ServiceAccountTokenSource>,
    endpoint: String,
}

impl DocumentAiClient {
    pub fn new(client: Client, auth: Arc<ServiceAccountTokenSource>, location: &str) -> Self {
        Self {
            client,
            auth,
            endpoint: format!("https://{location}-documentai.googleapis.com/v1"),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BatchOcrService for DocumentAiClient {
    async fn submit(&self, request: &BatchProcessRequest) -> Result<JobHandle> {
        let body = BatchProcessBody::from(request);
        let url = format!("{}/{}:batchProcess", self.endpoint, request.processor_path);
        let token = self.auth.token().await?;

        debug!(url = %url, input = %request.input.uri, "Sending batchProcess request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "documentai").await?;
        let operation: Operation = response.json().await?;

        if operation.name.is_empty() {
            return Err(MedexError::Internal(
                "batchProcess returned an operation without a name".to_string(),
            ));
        }
        Ok(JobHandle(operation.name))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot> {
        let url = format!("{}/{}", self.endpoint, handle.name());
        let token = self.auth.token().await?;

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let response = ensure_success(response, "documentai").await?;
        let operation: Operation = response.json().await?;

        Ok(operation.into_snapshot())
    }
}
