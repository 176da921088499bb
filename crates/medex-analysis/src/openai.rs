use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use medex_core::config::AppConfig;
use medex_core::error::{MedexError, Result};
use medex_core::transform::{MedicalRecord, TransformService, NOT_SPECIFIED};
use medex_core::PageText;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Fields requested from every record, in prompt order.
const MEDICAL_FIELDS: &[&str] = &[
    "Patient Information (Age, Sex, Race)",
    "Diagnosis",
    "Medical History",
    "Current Medications",
    "Prescribed Medications",
    "Psychiatric Evaluation",
    "Treatment Plan",
    "Doctor's Notes",
    "Doctor's Name",
    "Clinical Review (from Detailed Sensatecs Platform section)",
];

/// Structured medical-record extraction through the chat completions API.
pub struct OpenAiTransform {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

// ── Chat completions request/response types ───────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Implementation ─────────────────────────────────────────────────────────

impl OpenAiTransform {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }

    fn build_prompt(pages: &[PageText]) -> Result<String> {
        let fields = MEDICAL_FIELDS
            .iter()
            .map(|f| format!("  - {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        let data = serde_json::to_string(pages)?;

        Ok(format!(
            r#"Extract the following information from the provided JSON, format it as key-value pairs in JSON, and include the source page (marked in JSON as "page") next to each extracted data point:

{fields}

Additionally, provide a brief summary of the medical record based on the extracted information.

Return ONLY a JSON object of this shape:
{{
  "fields": {{
    "<field name>": {{"value": "<extracted value>", "source_pages": [<page numbers>]}}
  }},
  "summary": "<brief summary>"
}}
Fields with sub-fields (such as patient age, sex and race) may nest further objects of the same shape.
Use the literal string "{NOT_SPECIFIED}" for any field the record does not contain.

The JSON was parsed from handwriting and may contain incomplete words.

Data: {data}"#
        ))
    }

    async fn call_openai(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        tracing::debug!(model = %self.model, "Sending analysis request to OpenAI");

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MedexError::TransformService(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(MedexError::TransformService(format!(
                "OpenAI API returned status {status}: {body}"
            )));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| MedexError::TransformService(format!("Failed to parse API response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MedexError::TransformService("No choices in API response".to_string()))?;

        tracing::debug!(finish_reason = ?choice.finish_reason, "Received analysis response");

        choice
            .message
            .content
            .ok_or_else(|| MedexError::TransformService("Empty message content".to_string()))
    }

    fn parse_record(raw_json: &str) -> Result<MedicalRecord> {
        // Models sometimes wrap the object in markdown fences anyway.
        let cleaned = raw_json.trim();
        let cleaned = if cleaned.starts_with("```") {
            let start = cleaned.find('{').unwrap_or(0);
            let end = cleaned.rfind('}').map(|i| i + 1).unwrap_or(cleaned.len());
            &cleaned[start..end]
        } else {
            cleaned
        };

        serde_json::from_str(cleaned).map_err(|e| {
            tracing::error!(raw = %cleaned, error = %e, "Failed to parse analysis JSON");
            MedexError::TransformService(format!("Failed to parse model JSON output: {e}"))
        })
    }
}

#[async_trait]
impl TransformService for OpenAiTransform {
    async fn analyze(&self, pages: &[PageText]) -> Result<MedicalRecord> {
        tracing::info!(pages = pages.len(), "Starting record analysis");

        let prompt = Self::build_prompt(pages)?;
        let raw_json = self.call_openai(prompt).await?;
        let record = Self::parse_record(&raw_json)?;

        tracing::info!(
            fields = record.fields.len(),
            specified = record.fields.values().filter(|f| f.is_specified()).count(),
            "Analysis complete"
        );
        Ok(record)
    }
}
